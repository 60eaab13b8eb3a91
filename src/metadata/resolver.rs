//! Attribute resolution
//!
//! The engine asks a narrow query interface for everything that would come
//! from declared attributes: ignore flags, timeouts, retry policies, data
//! rows and cleanup timing.

use std::time::Duration;

use crate::config::{EngineConfig, FixtureTimeouts};
use crate::models::{ClassCleanupBehavior, DataRow, TestClassInfo, TestMethodInfo};
use crate::results::Phase;
use crate::retry::RetryPolicy;

/// Read-only queries over resolved test descriptors
pub trait AttributeResolver: Send + Sync {
    fn is_ignored(&self, method: &TestMethodInfo) -> bool;

    /// Effective timeout of a test method; `None` runs it unbounded
    fn timeout(&self, method: &TestMethodInfo) -> Option<Duration>;

    fn retry_policy(&self, method: &TestMethodInfo) -> Option<RetryPolicy>;

    /// Rows of a data-driven test in input order; `None` when not data-driven
    fn data_rows(&self, method: &TestMethodInfo) -> Option<Vec<DataRow>>;

    /// Class cleanup timing resolved over the class hierarchy
    fn cleanup_behavior(&self, class: &TestClassInfo) -> ClassCleanupBehavior;

    /// Effective timeout of a fixture method running in `phase`
    fn fixture_timeout(&self, phase: Phase, declared: Option<Duration>) -> Option<Duration>;
}

/// Resolver over the values declared on descriptors, with configured defaults
#[derive(Clone, Debug, Default)]
pub struct DeclaredAttributes {
    default_timeout: Option<Duration>,
    fixture_timeouts: FixtureTimeouts,
    default_cleanup: ClassCleanupBehavior,
}

impl DeclaredAttributes {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_timeout: config.default_test_timeout(),
            fixture_timeouts: config.fixture_timeouts.clone(),
            default_cleanup: config.class_cleanup_behavior,
        }
    }
}

impl AttributeResolver for DeclaredAttributes {
    fn is_ignored(&self, method: &TestMethodInfo) -> bool {
        method.ignored
    }

    fn timeout(&self, method: &TestMethodInfo) -> Option<Duration> {
        method
            .timeout
            .filter(|t| !t.is_zero())
            .or(self.default_timeout)
    }

    fn retry_policy(&self, method: &TestMethodInfo) -> Option<RetryPolicy> {
        method.retry.clone()
    }

    fn data_rows(&self, method: &TestMethodInfo) -> Option<Vec<DataRow>> {
        method.data_rows.clone()
    }

    /// `EndOfAssembly` on any level wins; a class with no declaration at
    /// any level uses the configured default.
    fn cleanup_behavior(&self, class: &TestClassInfo) -> ClassCleanupBehavior {
        let mut declared = class
            .hierarchy
            .iter()
            .filter_map(|level| level.cleanup_behavior)
            .peekable();

        if declared.peek().is_none() {
            return self.default_cleanup;
        }
        if declared.any(|b| b == ClassCleanupBehavior::EndOfAssembly) {
            ClassCleanupBehavior::EndOfAssembly
        } else {
            ClassCleanupBehavior::EndOfClass
        }
    }

    fn fixture_timeout(&self, phase: Phase, declared: Option<Duration>) -> Option<Duration> {
        declared
            .filter(|t| !t.is_zero())
            .or_else(|| self.fixture_timeouts.for_phase(phase))
    }
}
