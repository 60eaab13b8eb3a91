//! Unit-test execution engine
//!
//! Runs an already-resolved test assembly: assembly, class and test
//! fixtures, bounded execution under timeout and cancellation, retries of
//! failed tests, and aggregation of raw outcomes into result rows.
//!
//! ```no_run
//! use std::sync::Arc;
//! use test_engine::engine::{EngineServices, TestExecutionManager};
//! use test_engine::metadata::TestClassBuilder;
//! use test_engine::models::{AssemblyInfo, Assert};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let assembly = AssemblyInfo::new("Math").with_class(
//!     TestClassBuilder::new("Arithmetic", |_| Ok(()))
//!         .test("adds", |_, _| Assert::are_equal(4, 2 + 2))
//!         .build(),
//! );
//!
//! let report = TestExecutionManager::new(EngineServices::default())
//!     .run_assembly(Arc::new(assembly), CancellationToken::new())
//!     .await;
//! println!("{}", report.summary);
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod engine;
pub mod executor;
pub mod fixture;
pub mod metadata;
pub mod models;
pub mod output;
pub mod results;
pub mod retry;
pub mod samples;
pub mod utils;
