//! Test result models
//!
//! Defines the raw outcome of one invocation, the final per-row result
//! handed to consumers, and the run summary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::error::TestError;
use super::outcome::UnitTestOutcome;
use crate::capture::Diagnostics;

/// Failure description attached to a non-passing outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub message: String,
    pub stack_trace: Option<String>,
}

impl FailureInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack_trace: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: Option<String>) -> Self {
        self.stack_trace = stack_trace;
        self
    }
}

/// Raw outcome of one test invocation (one data row)
#[derive(Clone, Debug)]
pub struct UnitTestResult {
    pub outcome: UnitTestOutcome,
    pub failure: Option<FailureInfo>,
    pub error: Option<Arc<TestError>>,
    pub display_name: Option<String>,
    pub duration: Duration,
    pub diagnostics: Diagnostics,
    pub result_files: Vec<PathBuf>,
    pub data_row_index: Option<usize>,
}

impl UnitTestResult {
    pub fn new(outcome: UnitTestOutcome) -> Self {
        Self {
            outcome,
            failure: None,
            error: None,
            display_name: None,
            duration: Duration::ZERO,
            diagnostics: Diagnostics::default(),
            result_files: Vec::new(),
            data_row_index: None,
        }
    }

    pub fn passed() -> Self {
        Self::new(UnitTestOutcome::Passed)
    }

    pub fn failed(outcome: UnitTestOutcome, failure: FailureInfo) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(outcome)
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_error(mut self, error: Option<Arc<TestError>>) -> Self {
        self.error = error;
        self
    }

    pub fn message(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }
}

/// Final result row reported for a test
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub display_name: String,
    pub outcome: UnitTestOutcome,
    pub duration_ms: u64,
    /// -1 when the test is not data-driven
    pub row_index: i32,
    /// 0 for the normal attempt, n for the n-th retry
    pub attempt: u32,
    pub error_message: Option<String>,
    pub error_stack_trace: Option<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub trace: String,
    #[serde(default)]
    pub result_files: Vec<PathBuf>,
}

impl TestResult {
    pub fn new(test_name: impl Into<String>, outcome: UnitTestOutcome) -> Self {
        let test_name = test_name.into();
        Self {
            display_name: test_name.clone(),
            test_name,
            outcome,
            duration_ms: 0,
            row_index: -1,
            attempt: 0,
            error_message: None,
            error_stack_trace: None,
            stdout: String::new(),
            stderr: String::new(),
            trace: String::new(),
            result_files: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            trace: self.trace.clone(),
        }
    }

    pub fn set_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.stdout = diagnostics.stdout;
        self.stderr = diagnostics.stderr;
        self.trace = diagnostics.trace;
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.outcome.symbol(),
            self.display_name,
            self.duration_ms
        )?;
        if let Some(msg) = &self.error_message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Summary of one assembly run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub assembly: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub timeouts: usize,
    pub inconclusive: usize,
    pub ignored: usize,
    pub errors: usize,
    pub total_duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl RunSummary {
    pub fn new(assembly: impl Into<String>, results: Vec<TestResult>) -> Self {
        let count = |outcomes: &[UnitTestOutcome]| {
            results
                .iter()
                .filter(|r| outcomes.contains(&r.outcome))
                .count()
        };

        let passed = count(&[UnitTestOutcome::Passed]);
        let failed = count(&[UnitTestOutcome::Failed]);
        let timeouts = count(&[UnitTestOutcome::Timeout]);
        let inconclusive = count(&[UnitTestOutcome::Inconclusive]);
        let ignored = count(&[UnitTestOutcome::Ignored]);
        let errors = count(&[
            UnitTestOutcome::Error,
            UnitTestOutcome::Unknown,
            UnitTestOutcome::InProgress,
            UnitTestOutcome::NotRunnable,
        ]);
        let total_duration_ms = results.iter().map(|r| r.duration_ms).sum();

        Self {
            assembly: assembly.into(),
            total: results.len(),
            passed,
            failed,
            timeouts,
            inconclusive,
            ignored,
            errors,
            total_duration_ms,
            results,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        let executed = self.total - self.ignored;
        if executed == 0 {
            0.0
        } else {
            (self.passed as f64 / executed as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.passed + self.ignored == self.total
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Assembly {}", self.assembly)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Timeout: {} | Inconclusive: {} | Ignored: {} | Error: {}",
            self.total,
            self.passed,
            self.failed,
            self.timeouts,
            self.inconclusive,
            self.ignored,
            self.errors
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.total_duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_defaults() {
        let result = TestResult::new("MathTests.adds", UnitTestOutcome::Passed);
        assert_eq!(result.row_index, -1);
        assert_eq!(result.display_name, "MathTests.adds");
        assert!(result.outcome.is_success());
    }

    #[test]
    fn test_run_summary_counts() {
        let results = vec![
            TestResult::new("A.one", UnitTestOutcome::Passed),
            TestResult::new("A.two", UnitTestOutcome::Failed).with_message("boom"),
            TestResult::new("A.three", UnitTestOutcome::Ignored),
            TestResult::new("A.four", UnitTestOutcome::Timeout),
            TestResult::new("A.five", UnitTestOutcome::NotRunnable),
        ];

        let summary = RunSummary::new("sample", results);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.timeouts, 1);
        assert_eq!(summary.errors, 1);
        assert!((summary.pass_rate() - 25.0).abs() < f64::EPSILON);
        assert!(!summary.is_all_passed());
    }

    #[test]
    fn test_display_includes_message() {
        let result = TestResult::new("A.two", UnitTestOutcome::Failed).with_message("boom");
        assert!(result.to_string().ends_with("- boom"));
    }
}
