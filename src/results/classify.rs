//! Failure classification
//!
//! Turns what a unit produced (an error, a panic or an interruption) into
//! an outcome plus a failure description.

use std::backtrace::BacktraceStatus;
use std::fmt;
use std::sync::Arc;

use super::stack::{describe_chain, trim_backtrace, FRAMEWORK_FRAME_PREFIXES};
use crate::executor::{Interruption, Panic, UnitLabel};
use crate::models::{FailureInfo, TestError, UnitTestOutcome, UnitTestResult};

/// Lifecycle phase a unit belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    AssemblyInitialize,
    ClassInitialize,
    InstanceCreation,
    TestInitialize,
    TestMethod,
    TestCleanup,
    Dispose,
    ClassCleanup,
    AssemblyCleanup,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Phase::AssemblyInitialize => "Assembly initialization method",
            Phase::ClassInitialize => "Class initialization method",
            Phase::InstanceCreation => "Constructor of",
            Phase::TestInitialize => "Initialization method",
            Phase::TestMethod => "Test method",
            Phase::TestCleanup => "Cleanup method",
            Phase::Dispose => "Dispose method",
            Phase::ClassCleanup => "Class cleanup method",
            Phase::AssemblyCleanup => "Assembly cleanup method",
        };
        f.write_str(text)
    }
}

/// Classified failure of one unit
#[derive(Clone, Debug)]
pub struct Classified {
    pub outcome: UnitTestOutcome,
    pub failure: FailureInfo,
    pub error: Option<Arc<TestError>>,
}

impl Classified {
    /// Raw row outcome carrying this failure
    pub fn into_unit_result(self) -> UnitTestResult {
        UnitTestResult::failed(self.outcome, self.failure).with_error(self.error)
    }
}

/// Classify the full result of a bounded run. `None` means success.
pub fn classify_run(
    result: Result<Result<Result<(), TestError>, Panic>, Interruption>,
    phase: Phase,
    label: &UnitLabel,
) -> Option<Classified> {
    match result {
        Ok(Ok(Ok(()))) => None,
        Ok(Ok(Err(error))) => Some(classify_error(error, phase, label)),
        Ok(Err(payload)) => Some(classify_panic(payload, phase, label)),
        Err(interruption) => Some(classify_interruption(&interruption)),
    }
}

/// Map an error raised by test code onto the outcome taxonomy
pub fn classify_error(error: TestError, phase: Phase, label: &UnitLabel) -> Classified {
    let (outcome, failure) = match &error {
        TestError::Inconclusive { message, location } => (
            UnitTestOutcome::Inconclusive,
            FailureInfo::new(phase_message(phase, label, message))
                .with_stack_trace(location.clone()),
        ),
        TestError::AssertFailed { message, location } => (
            UnitTestOutcome::Failed,
            FailureInfo::new(phase_message(phase, label, message))
                .with_stack_trace(location.clone()),
        ),
        TestError::Unexpected(inner) => {
            let root = inner.root_cause().to_string();
            (
                UnitTestOutcome::Failed,
                FailureInfo::new(exception_message(phase, label, &root))
                    .with_stack_trace(error_location(inner)),
            )
        }
    };

    Classified {
        outcome,
        failure,
        error: Some(Arc::new(error)),
    }
}

/// Map a panic payload; a `TestError` payload is classified like a returned error
pub fn classify_panic(payload: Panic, phase: Phase, label: &UnitLabel) -> Classified {
    let payload = match payload.downcast::<TestError>() {
        Ok(error) => return classify_error(*error, phase, label),
        Err(other) => other,
    };

    let text = panic_text(&payload);
    Classified {
        outcome: UnitTestOutcome::Failed,
        failure: FailureInfo::new(exception_message(phase, label, &format!("panicked: {text}"))),
        error: Some(Arc::new(TestError::unexpected(text))),
    }
}

pub fn classify_interruption(interruption: &Interruption) -> Classified {
    Classified {
        outcome: UnitTestOutcome::Timeout,
        failure: FailureInfo::new(interruption.message()),
        error: None,
    }
}

/// Text carried by a panic payload
pub fn panic_text(payload: &Panic) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn phase_message(phase: Phase, label: &UnitLabel, message: &str) -> String {
    match phase {
        Phase::TestMethod => message.to_string(),
        _ => exception_message(phase, label, message),
    }
}

fn exception_message(phase: Phase, label: &UnitLabel, message: &str) -> String {
    match phase {
        Phase::InstanceCreation => format!(
            "Unable to create instance of class {}. Error: {}",
            label.declaring_type, message
        ),
        _ => format!("{phase} {label} threw exception: {message}"),
    }
}

/// Best-effort location: the error chain plus test-code backtrace frames
fn error_location(error: &anyhow::Error) -> Option<String> {
    let chain = describe_chain(error.chain().map(|e| e.to_string()).collect());

    let backtrace = error.backtrace();
    let frames = if backtrace.status() == BacktraceStatus::Captured {
        trim_backtrace(&backtrace.to_string(), FRAMEWORK_FRAME_PREFIXES)
    } else {
        None
    };

    match (chain, frames) {
        (Some(chain), Some(frames)) => Some(format!("{chain}\n{frames}")),
        (chain, frames) => chain.or(frames),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Assert;
    use anyhow::Context;

    fn label() -> UnitLabel {
        UnitLabel::new("OrderTests", "places_order")
    }

    #[test]
    fn test_unit_result_keeps_the_error() {
        let classified = classify_error(
            TestError::unexpected("disk full"),
            Phase::TestMethod,
            &label(),
        );
        let result = classified.into_unit_result();

        assert_eq!(result.outcome, UnitTestOutcome::Failed);
        assert!(matches!(
            result.error.as_deref(),
            Some(TestError::Unexpected(_))
        ));
    }

    #[test]
    fn test_success_is_none() {
        assert!(classify_run(Ok(Ok(Ok(()))), Phase::TestMethod, &label()).is_none());
    }

    #[test]
    fn test_assert_failure_keeps_message_in_test_method() {
        let error = Assert::are_equal(1, 2).unwrap_err();
        let classified = classify_error(error, Phase::TestMethod, &label());

        assert_eq!(classified.outcome, UnitTestOutcome::Failed);
        assert_eq!(
            classified.failure.message,
            "are_equal failed. Expected: <1>. Actual: <2>."
        );
        assert!(classified.failure.stack_trace.unwrap().contains("classify.rs"));
    }

    #[test]
    fn test_inconclusive_in_initialize_is_prefixed() {
        let error = TestError::inconclusive("database offline");
        let classified = classify_error(error, Phase::TestInitialize, &label());

        assert_eq!(classified.outcome, UnitTestOutcome::Inconclusive);
        assert_eq!(
            classified.failure.message,
            "Initialization method OrderTests.places_order threw exception: database offline"
        );
    }

    #[test]
    fn test_unexpected_uses_innermost_message() {
        let inner: anyhow::Result<()> = Err(anyhow::anyhow!("disk full"));
        let error: TestError = inner.context("saving order").unwrap_err().into();
        let classified = classify_error(error, Phase::TestMethod, &label());

        assert_eq!(classified.outcome, UnitTestOutcome::Failed);
        assert_eq!(
            classified.failure.message,
            "Test method OrderTests.places_order threw exception: disk full"
        );
        assert!(classified
            .failure
            .stack_trace
            .unwrap()
            .starts_with("saving order\n ---> disk full"));
    }

    #[test]
    fn test_panic_payloads() {
        let classified = classify_panic(Box::new("index out of range"), Phase::TestMethod, &label());
        assert_eq!(classified.outcome, UnitTestOutcome::Failed);
        assert_eq!(
            classified.failure.message,
            "Test method OrderTests.places_order threw exception: panicked: index out of range"
        );

        let from_error = classify_panic(
            Box::new(TestError::inconclusive("skip me")),
            Phase::TestMethod,
            &label(),
        );
        assert_eq!(from_error.outcome, UnitTestOutcome::Inconclusive);
    }

    #[test]
    fn test_instance_creation_message() {
        let classified = classify_error(
            TestError::unexpected("missing connection string"),
            Phase::InstanceCreation,
            &label(),
        );
        assert_eq!(
            classified.failure.message,
            "Unable to create instance of class OrderTests. Error: missing connection string"
        );
    }

    #[test]
    fn test_interruption_is_timeout() {
        let classified = classify_run(
            Err(Interruption::cancelled(&label())),
            Phase::TestMethod,
            &label(),
        )
        .unwrap();
        assert_eq!(classified.outcome, UnitTestOutcome::Timeout);
        assert!(classified.failure.message.contains("was cancelled"));
    }
}
