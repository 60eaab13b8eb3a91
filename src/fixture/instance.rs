//! Test initialize and test cleanup chains
//!
//! Initialize stops at the first failure. Cleanup never short-circuits: every
//! level runs, then the disposer, and only the first failure is reported on
//! the result. Later failures go to the message sink.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::graph::FixtureGraph;
use super::invoke::{invoke_instance, Call};
use crate::engine::EngineServices;
use crate::models::{Instance, TestContext};
use crate::results::{Classified, Phase};

/// Run test initialize methods base → derived
pub async fn run_test_initialize(
    services: &EngineServices,
    graph: &FixtureGraph,
    instance: &Instance,
    ctx: &TestContext,
    cancel: &CancellationToken,
) -> Option<Classified> {
    for fixture in &graph.initialize_chain {
        let call = Call::new(&fixture.declaring_type, &fixture.name, Phase::TestInitialize)
            .with_timeout(fixture.timeout);
        if let Some(failure) =
            invoke_instance(services, call, &fixture.body, instance, ctx, cancel).await
        {
            debug!(fixture = %fixture.name, "test initialize failed, skipping the rest of the chain");
            return Some(failure);
        }
    }
    None
}

/// Run test cleanup methods derived → base, then the disposer.
///
/// Cleanup is driven by its own token so an abandoned or cancelled body
/// never prevents the instance from being cleaned up.
pub async fn run_test_cleanup(
    services: &EngineServices,
    graph: &FixtureGraph,
    instance: &Instance,
    ctx: &TestContext,
) -> Option<Classified> {
    let cancel = CancellationToken::new();
    let mut first: Option<Classified> = None;

    for fixture in &graph.cleanup_chain {
        let call = Call::new(&fixture.declaring_type, &fixture.name, Phase::TestCleanup)
            .with_timeout(fixture.timeout);
        if let Some(failure) =
            invoke_instance(services, call, &fixture.body, instance, ctx, &cancel).await
        {
            record(services, &mut first, failure);
        }
    }

    if let Some(disposer) = &graph.disposer {
        let call = Call::new(&graph.class_name, "dispose", Phase::Dispose)
            .with_timeout(services.resolver.fixture_timeout(Phase::Dispose, None));
        if let Some(failure) = invoke_instance(services, call, disposer, instance, ctx, &cancel).await
        {
            record(services, &mut first, failure);
        }
    }

    first
}

fn record(services: &EngineServices, first: &mut Option<Classified>, failure: Classified) {
    if first.is_none() {
        *first = Some(failure);
    } else {
        services.sink.warn(&failure.failure.message);
    }
}
