//! Logging utilities
//!
//! Console logging through a filtered fmt layer, plus the capture layer that
//! routes events emitted by test code into the running test's trace output.

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::capture::CaptureLayer;

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Console filter: `RUST_LOG` when set, otherwise the engine at `level`
pub fn console_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("test_engine={}", level.to_tracing_level())))
}

/// Capture filter: events from test code at `level` or above reach the
/// running test's trace output, whatever their target
pub fn capture_filter(level: LogLevel) -> LevelFilter {
    LevelFilter::from_level(level.to_tracing_level())
}

/// Initialize the logger with specified level.
///
/// Each layer carries its own filter: the console one honours `RUST_LOG`,
/// the capture one only checks the level.
pub fn init_logger(level: LogLevel) {
    let console = fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(console_filter(level));

    tracing_subscriber::registry()
        .with(console)
        .with(CaptureLayer::new().with_filter(capture_filter(level)))
        .init();
}
