//! Result aggregation
//!
//! Folds the raw outcomes of one test (one per data row) into the final
//! result rows reported to consumers.

use crate::capture::Diagnostics;
use crate::models::{TestResult, UnitTestOutcome, UnitTestResult};

/// Message of the synthetic result produced when a test yielded nothing
pub const NO_RESULT_MESSAGE: &str = "No result was produced for this test.";

/// Extra information needed to build result rows
#[derive(Clone, Debug, Default)]
pub struct AggregationInput {
    pub test_name: String,
    pub data_driven: bool,
    pub attempt: u32,
    /// Class/assembly setup output, attached to the first row
    pub setup: Option<Diagnostics>,
    /// Class/assembly cleanup output, attached to the last row
    pub cleanup: Option<Diagnostics>,
}

impl AggregationInput {
    pub fn new(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            ..Default::default()
        }
    }

    pub fn data_driven(mut self, data_driven: bool) -> Self {
        self.data_driven = data_driven;
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_setup(mut self, setup: Option<Diagnostics>) -> Self {
        self.setup = setup;
        self
    }
}

/// Builds final result rows
pub struct ResultAggregator;

impl ResultAggregator {
    /// Test-level outcome of a set of rows; an empty set is an error
    pub fn aggregate_outcome(rows: &[UnitTestResult]) -> UnitTestOutcome {
        if rows.is_empty() {
            return UnitTestOutcome::Error;
        }
        UnitTestOutcome::aggregate(rows.iter().map(|r| r.outcome))
    }

    /// One result row per raw outcome, in input order
    pub fn aggregate(rows: Vec<UnitTestResult>, input: AggregationInput) -> Vec<TestResult> {
        let mut results: Vec<TestResult> = if rows.is_empty() {
            vec![Self::no_result(&input.test_name)]
        } else {
            rows.into_iter()
                .enumerate()
                .map(|(position, row)| Self::to_result(row, position, &input))
                .collect()
        };

        if let Some(setup) = &input.setup {
            Self::attach_setup(&mut results, setup);
        }
        if let Some(cleanup) = &input.cleanup {
            Self::attach_cleanup(&mut results, cleanup);
        }
        results
    }

    /// Synthetic row for a test that produced no outcome
    pub fn no_result(test_name: &str) -> TestResult {
        TestResult::new(test_name, UnitTestOutcome::Error).with_message(NO_RESULT_MESSAGE)
    }

    /// Prepend setup diagnostics to the first row
    pub fn attach_setup(results: &mut [TestResult], setup: &Diagnostics) {
        if setup.is_empty() {
            return;
        }
        if let Some(first) = results.first_mut() {
            let mut diagnostics = first.diagnostics();
            diagnostics.prepend(setup);
            first.set_diagnostics(diagnostics);
        }
    }

    /// Append cleanup diagnostics to the last row
    pub fn attach_cleanup(results: &mut [TestResult], cleanup: &Diagnostics) {
        if cleanup.is_empty() {
            return;
        }
        if let Some(last) = results.last_mut() {
            let mut diagnostics = last.diagnostics();
            diagnostics.append(cleanup);
            last.set_diagnostics(diagnostics);
        }
    }

    fn to_result(row: UnitTestResult, position: usize, input: &AggregationInput) -> TestResult {
        let row_index = if input.data_driven {
            i32::try_from(row.data_row_index.unwrap_or(position)).unwrap_or(i32::MAX)
        } else {
            -1
        };

        let (error_message, error_stack_trace) = match row.failure {
            Some(failure) => (Some(failure.message), failure.stack_trace),
            None => (None, None),
        };

        TestResult {
            test_name: input.test_name.clone(),
            display_name: row
                .display_name
                .unwrap_or_else(|| input.test_name.clone()),
            outcome: row.outcome,
            duration_ms: row.duration.as_millis() as u64,
            row_index,
            attempt: input.attempt,
            error_message,
            error_stack_trace,
            stdout: row.diagnostics.stdout,
            stderr: row.diagnostics.stderr,
            trace: row.diagnostics.trace,
            result_files: row.result_files,
        }
    }
}
