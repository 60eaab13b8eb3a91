//! Precomputed fixture chains of a test class

use std::fmt;

use crate::metadata::AttributeResolver;
use crate::models::{FixtureMethod, InstanceFixture, InstanceFn, TestClassInfo};
use crate::results::Phase;

/// Fixture methods of one class, resolved once per run.
///
/// Both chains are indexed by hierarchy depth; cleanup walks the levels in
/// the reverse of initialize order.
#[derive(Clone)]
pub struct FixtureGraph {
    pub class_name: String,
    /// Test initialize methods, base → derived
    pub initialize_chain: Vec<InstanceFixture>,
    /// Test cleanup methods, derived → base
    pub cleanup_chain: Vec<InstanceFixture>,
    pub class_initialize: Option<FixtureMethod>,
    pub class_cleanup: Option<FixtureMethod>,
    pub disposer: Option<InstanceFn>,
}

impl fmt::Debug for FixtureGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureGraph")
            .field("class_name", &self.class_name)
            .field("initialize_chain", &self.initialize_chain)
            .field("cleanup_chain", &self.cleanup_chain)
            .field("class_initialize", &self.class_initialize)
            .field("class_cleanup", &self.class_cleanup)
            .field("disposer", &self.disposer.is_some())
            .finish()
    }
}

impl FixtureGraph {
    /// Walk the hierarchy once, applying resolved fixture timeouts
    pub fn resolve(class: &TestClassInfo, resolver: &dyn AttributeResolver) -> Self {
        let with_timeout = |fixture: &InstanceFixture, phase: Phase| InstanceFixture {
            timeout: resolver.fixture_timeout(phase, fixture.timeout),
            ..fixture.clone()
        };

        let initialize_chain = class
            .hierarchy
            .iter()
            .filter_map(|level| level.test_initialize.as_ref())
            .map(|f| with_timeout(f, Phase::TestInitialize))
            .collect();

        let cleanup_chain = class
            .hierarchy
            .iter()
            .rev()
            .filter_map(|level| level.test_cleanup.as_ref())
            .map(|f| with_timeout(f, Phase::TestCleanup))
            .collect();

        let class_fixture = |fixture: &Option<FixtureMethod>, phase: Phase| {
            fixture.as_ref().map(|f| FixtureMethod {
                timeout: resolver.fixture_timeout(phase, f.timeout),
                ..f.clone()
            })
        };

        Self {
            class_name: class.name.clone(),
            initialize_chain,
            cleanup_chain,
            class_initialize: class_fixture(&class.class_initialize, Phase::ClassInitialize),
            class_cleanup: class_fixture(&class.class_cleanup, Phase::ClassCleanup),
            disposer: class.disposer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::metadata::{DeclaredAttributes, LevelBuilder, TestClassBuilder};
    use std::time::Duration;

    struct Fixture;

    fn three_levels() -> TestClassInfo {
        TestClassBuilder::new("Leaf", |_| Ok(Fixture))
            .base(
                LevelBuilder::new("Root")
                    .test_initialize("root_init", |_: &Fixture, _| Ok(()))
                    .test_cleanup("root_cleanup", |_: &Fixture, _| Ok(())),
            )
            .base(LevelBuilder::new("Middle").test_cleanup("middle_cleanup", |_: &Fixture, _| Ok(())))
            .test_initialize("leaf_init", |_, _| Ok(()))
            .test_cleanup("leaf_cleanup", |_, _| Ok(()))
            .class_initialize("setup", |_| Ok(()))
            .test("works", |_, _| Ok(()))
            .build()
    }

    #[test]
    fn test_chain_orders_are_reversed() {
        let graph = FixtureGraph::resolve(&three_levels(), &DeclaredAttributes::default());

        let init: Vec<&str> = graph.initialize_chain.iter().map(|f| f.name.as_str()).collect();
        let cleanup: Vec<&str> = graph.cleanup_chain.iter().map(|f| f.name.as_str()).collect();

        assert_eq!(init, vec!["root_init", "leaf_init"]);
        assert_eq!(cleanup, vec!["leaf_cleanup", "middle_cleanup", "root_cleanup"]);
        assert_eq!(graph.cleanup_chain[1].declaring_type, "Middle");
    }

    #[test]
    fn test_fixture_timeouts_are_applied() {
        let mut config = EngineConfig::default();
        config.fixture_timeouts.test_cleanup_ms = 75;
        config.fixture_timeouts.class_initialize_ms = 500;

        let graph = FixtureGraph::resolve(&three_levels(), &DeclaredAttributes::new(&config));
        assert!(graph
            .cleanup_chain
            .iter()
            .all(|f| f.timeout == Some(Duration::from_millis(75))));
        assert_eq!(graph.initialize_chain[0].timeout, None);
        assert_eq!(
            graph.class_initialize.unwrap().timeout,
            Some(Duration::from_millis(500))
        );
        assert!(graph.class_cleanup.is_none());
    }
}
