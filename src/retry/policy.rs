//! Retry policy attached to a test method

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// How the delay between retry attempts evolves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Constant,
    Exponential,
}

/// Invalid retry configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryConfigError {
    #[error("max_retry_attempts must be at least 1, got {0}")]
    AttemptsOutOfRange(u32),
}

/// Validated retry policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRetryPolicy")]
pub struct RetryPolicy {
    max_retry_attempts: u32,
    delay_ms: u64,
    backoff: BackoffKind,
}

/// Unvalidated form read from configuration files
#[derive(Deserialize)]
struct RawRetryPolicy {
    max_retry_attempts: u32,
    #[serde(default)]
    delay_ms: u64,
    #[serde(default)]
    backoff: BackoffKind,
}

impl TryFrom<RawRetryPolicy> for RetryPolicy {
    type Error = RetryConfigError;

    fn try_from(raw: RawRetryPolicy) -> Result<Self, Self::Error> {
        RetryPolicy::new(
            raw.max_retry_attempts,
            Duration::from_millis(raw.delay_ms),
            raw.backoff,
        )
    }
}

impl RetryPolicy {
    pub fn new(
        max_retry_attempts: u32,
        delay: Duration,
        backoff: BackoffKind,
    ) -> Result<Self, RetryConfigError> {
        if max_retry_attempts < 1 {
            return Err(RetryConfigError::AttemptsOutOfRange(max_retry_attempts));
        }
        Ok(Self {
            max_retry_attempts,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            backoff,
        })
    }

    pub fn max_retry_attempts(&self) -> u32 {
        self.max_retry_attempts
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn backoff(&self) -> BackoffKind {
        self.backoff
    }

    /// Delay to use after waiting `current`
    pub fn next_delay(&self, current: Duration) -> Duration {
        match self.backoff {
            BackoffKind::Constant => current,
            BackoffKind::Exponential => current.saturating_mul(2),
        }
    }
}
