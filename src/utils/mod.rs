//! Shared utilities: logging, message sinks and timing

mod logger;
mod sink;
mod timer;

pub use logger::{console_filter, init_logger, LogLevel};
pub use sink::{MemorySink, MessageLevel, MessageSink, TracingSink};
pub use timer::{Stopwatch, Timer};
