//! Data models for test execution
//!
//! This module contains the descriptors the engine consumes and the result
//! types it produces.

mod context;
mod error;
mod outcome;
mod test_method;
mod test_result;

pub use context::TestContext;
pub use error::{Assert, TestError};
pub use outcome::UnitTestOutcome;
pub use test_method::{
    AssemblyInfo, ClassCleanupBehavior, ClassLevel, DataRow, FixtureMethod, Instance,
    InstanceFactory, InstanceFixture, InstanceFn, StaticFn, TestClassInfo, TestMethodInfo,
};
pub use test_result::{FailureInfo, RunSummary, TestResult, UnitTestResult};
