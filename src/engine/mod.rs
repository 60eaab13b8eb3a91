//! Test execution engine
//!
//! The method runner drives one test through its fixtures, retries and
//! aggregation; the manager drives a whole assembly.

mod manager;
mod method;
mod services;

pub use manager::{RunReport, TestExecutionManager};
pub use method::TestMethodRunner;
pub use services::EngineServices;
