//! Fixture lifecycle coordination
//!
//! Assembly and class scopes, the precomputed fixture graph, and the test
//! initialize/cleanup chains run around every test invocation.

mod assembly;
mod class;
mod graph;
mod instance;
mod invoke;

pub use assembly::AssemblyScope;
pub use class::{ClassScope, ClassState};
pub use graph::FixtureGraph;
pub use instance::{run_test_cleanup, run_test_initialize};
pub use invoke::{create_instance, invoke_instance, invoke_static, Call};

use std::sync::Arc;

use crate::capture::Diagnostics;
use crate::models::{FailureInfo, TestError, UnitTestOutcome, UnitTestResult};
use crate::results::Classified;

/// Cached failure of an assembly or class initialize, surfaced on every
/// affected test without re-running the fixture
#[derive(Clone, Debug)]
pub struct SetupFailure {
    pub outcome: UnitTestOutcome,
    pub failure: FailureInfo,
    pub error: Option<Arc<TestError>>,
}

impl SetupFailure {
    pub fn new(outcome: UnitTestOutcome, failure: FailureInfo) -> Self {
        Self {
            outcome,
            failure,
            error: None,
        }
    }

    /// Raw outcome synthesized for a test that could not run
    pub fn to_unit_result(&self) -> UnitTestResult {
        UnitTestResult::failed(self.outcome, self.failure.clone()).with_error(self.error.clone())
    }
}

impl From<Classified> for SetupFailure {
    fn from(classified: Classified) -> Self {
        Self {
            outcome: classified.outcome,
            failure: classified.failure,
            error: classified.error,
        }
    }
}

/// Outcome of a class or assembly cleanup
#[derive(Clone, Debug)]
pub struct CleanupReport {
    pub failure: Option<Classified>,
    pub diagnostics: Diagnostics,
}
