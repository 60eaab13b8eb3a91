//! Results module
//!
//! Failure classification, stack trimming, per-row aggregation and
//! persistent storage of run summaries.

mod aggregator;
mod classify;
mod stack;
mod storage;

pub use aggregator::{AggregationInput, ResultAggregator, NO_RESULT_MESSAGE};
pub use classify::{
    classify_error, classify_interruption, classify_panic, classify_run, panic_text, Classified,
    Phase,
};
pub use stack::{describe_chain, trim_backtrace, FRAMEWORK_FRAME_PREFIXES};
pub use storage::{EnvironmentInfo, ResultsStorage, RunInfo, StoredRun};
