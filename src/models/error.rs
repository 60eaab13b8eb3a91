//! Errors raised by test code
//!
//! Test methods and fixtures return `Result<(), TestError>`. The variant
//! decides how the failure is classified into an outcome.

use std::fmt::Debug;
use std::panic::Location;
use thiserror::Error;

/// Error produced by a test method, fixture, factory or disposer
#[derive(Error, Debug)]
pub enum TestError {
    /// The test could not reach a verdict
    #[error("{message}")]
    Inconclusive {
        message: String,
        location: Option<String>,
    },

    /// An assertion did not hold
    #[error("{message}")]
    AssertFailed {
        message: String,
        location: Option<String>,
    },

    /// Anything else the test code raised
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl TestError {
    #[track_caller]
    pub fn inconclusive(message: impl Into<String>) -> Self {
        TestError::Inconclusive {
            message: message.into(),
            location: Some(caller_location()),
        }
    }

    #[track_caller]
    pub fn assert_failed(message: impl Into<String>) -> Self {
        TestError::AssertFailed {
            message: message.into(),
            location: Some(caller_location()),
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        TestError::Unexpected(anyhow::anyhow!(message.into()))
    }

    /// Source location recorded by an assertion helper
    pub fn location(&self) -> Option<&str> {
        match self {
            TestError::Inconclusive { location, .. } | TestError::AssertFailed { location, .. } => {
                location.as_deref()
            }
            TestError::Unexpected(_) => None,
        }
    }
}

/// Assertion helpers returning `TestError` on failure
pub struct Assert;

impl Assert {
    #[track_caller]
    pub fn is_true(condition: bool, message: impl Into<String>) -> Result<(), TestError> {
        if condition {
            Ok(())
        } else {
            Err(TestError::assert_failed(format!(
                "is_true failed. {}",
                message.into()
            )))
        }
    }

    #[track_caller]
    pub fn is_false(condition: bool, message: impl Into<String>) -> Result<(), TestError> {
        if condition {
            Err(TestError::assert_failed(format!(
                "is_false failed. {}",
                message.into()
            )))
        } else {
            Ok(())
        }
    }

    #[track_caller]
    pub fn are_equal<T: PartialEq + Debug>(expected: T, actual: T) -> Result<(), TestError> {
        if expected == actual {
            Ok(())
        } else {
            Err(TestError::assert_failed(format!(
                "are_equal failed. Expected: <{expected:?}>. Actual: <{actual:?}>."
            )))
        }
    }

    #[track_caller]
    pub fn fail(message: impl Into<String>) -> Result<(), TestError> {
        Err(TestError::assert_failed(format!("fail. {}", message.into())))
    }

    #[track_caller]
    pub fn inconclusive(message: impl Into<String>) -> Result<(), TestError> {
        Err(TestError::inconclusive(format!(
            "inconclusive. {}",
            message.into()
        )))
    }
}

#[track_caller]
fn caller_location() -> String {
    let location = Location::caller();
    format!(
        "at {}:{}:{}",
        location.file(),
        location.line(),
        location.column()
    )
}
