//! Test outcome kinds
//!
//! Defines the outcome of a single test invocation and the precedence rule
//! used to fold several outcomes into one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a test invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitTestOutcome {
    Passed,
    Failed,
    Inconclusive,
    Timeout,
    Error,
    Unknown,
    InProgress,
    Ignored,
    NotRunnable,
}

impl UnitTestOutcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnitTestOutcome::Passed => "✓",
            UnitTestOutcome::Failed => "✗",
            UnitTestOutcome::Inconclusive => "?",
            UnitTestOutcome::Timeout => "⧗",
            UnitTestOutcome::Error => "!",
            UnitTestOutcome::Unknown => "·",
            UnitTestOutcome::InProgress => "…",
            UnitTestOutcome::Ignored => "○",
            UnitTestOutcome::NotRunnable => "⊘",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UnitTestOutcome::Passed)
    }

    /// Whether a retry attempt producing this outcome needs another attempt
    pub fn needs_retry(&self) -> bool {
        matches!(self, UnitTestOutcome::Failed | UnitTestOutcome::Timeout)
    }

    /// Fold a sequence of outcomes into the aggregate outcome.
    ///
    /// Failed is sticky, Timeout only yields to Failed, and any other
    /// non-passing outcome replaces the running aggregate.
    pub fn aggregate<I>(outcomes: I) -> UnitTestOutcome
    where
        I: IntoIterator<Item = UnitTestOutcome>,
    {
        let mut aggregate = UnitTestOutcome::Passed;
        for outcome in outcomes {
            if outcome == UnitTestOutcome::Passed || aggregate == UnitTestOutcome::Failed {
                continue;
            }
            if outcome == UnitTestOutcome::Failed || aggregate != UnitTestOutcome::Timeout {
                aggregate = outcome;
            }
        }
        aggregate
    }
}

impl fmt::Display for UnitTestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnitTestOutcome::Passed => "PASSED",
            UnitTestOutcome::Failed => "FAILED",
            UnitTestOutcome::Inconclusive => "INCONCLUSIVE",
            UnitTestOutcome::Timeout => "TIMEOUT",
            UnitTestOutcome::Error => "ERROR",
            UnitTestOutcome::Unknown => "UNKNOWN",
            UnitTestOutcome::InProgress => "IN PROGRESS",
            UnitTestOutcome::Ignored => "IGNORED",
            UnitTestOutcome::NotRunnable => "NOT RUNNABLE",
        };
        write!(f, "{label}")
    }
}
