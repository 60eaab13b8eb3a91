//! Message sink for engine warnings
//!
//! Cleanup failures that are not attached to a result (second and later
//! cleanup errors, deferred class cleanup) are reported here.

use std::fmt;
use std::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageLevel {
    Informational,
    Warning,
    Error,
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageLevel::Informational => write!(f, "info"),
            MessageLevel::Warning => write!(f, "warning"),
            MessageLevel::Error => write!(f, "error"),
        }
    }
}

/// Receives engine messages
pub trait MessageSink: Send + Sync {
    fn send(&self, level: MessageLevel, text: &str);

    fn warn(&self, text: &str) {
        self.send(MessageLevel::Warning, text);
    }
}

/// Forwards messages to `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn send(&self, level: MessageLevel, text: &str) {
        match level {
            MessageLevel::Informational => info!(target: "test_engine::sink", "{text}"),
            MessageLevel::Warning => warn!(target: "test_engine::sink", "{text}"),
            MessageLevel::Error => error!(target: "test_engine::sink", "{text}"),
        }
    }
}

/// Keeps messages in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<(MessageLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(level, _)| *level == MessageLevel::Warning)
            .map(|(_, text)| text)
            .collect()
    }
}

impl MessageSink for MemorySink {
    fn send(&self, level: MessageLevel, text: &str) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((level, text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.warn("cleanup failed");
        sink.send(MessageLevel::Informational, "done");

        assert_eq!(sink.messages().len(), 2);
        assert_eq!(sink.warnings(), vec!["cleanup failed".to_string()]);
    }

    #[test]
    fn test_level_display() {
        assert_eq!(MessageLevel::Warning.to_string(), "warning");
    }
}
