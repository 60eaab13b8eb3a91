//! Retry support
//!
//! Policy validation and the orchestrator that re-drives failed tests.

mod orchestrator;
mod policy;

pub use orchestrator::{is_acceptable, RetryOrchestrator, RetryResult};
pub use policy::{BackoffKind, RetryConfigError, RetryPolicy};
