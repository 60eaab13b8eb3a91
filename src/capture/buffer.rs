//! Captured diagnostic buffers

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Diagnostic channel a write is routed to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    StdOut,
    StdErr,
    Trace,
}

/// Text collected for one bounded execution scope
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub stdout: String,
    pub stderr: String,
    pub trace: String,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty() && self.trace.is_empty()
    }

    /// Put `earlier` in front of the text already collected
    pub fn prepend(&mut self, earlier: &Diagnostics) {
        self.stdout.insert_str(0, &earlier.stdout);
        self.stderr.insert_str(0, &earlier.stderr);
        self.trace.insert_str(0, &earlier.trace);
    }

    /// Add `later` after the text already collected
    pub fn append(&mut self, later: &Diagnostics) {
        self.stdout.push_str(&later.stdout);
        self.stderr.push_str(&later.stderr);
        self.trace.push_str(&later.trace);
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut String {
        match channel {
            Channel::StdOut => &mut self.stdout,
            Channel::StdErr => &mut self.stderr,
            Channel::Trace => &mut self.trace,
        }
    }
}

/// Shared handle to one scope's diagnostics.
///
/// Cloning the handle shares the buffer; each test invocation creates its
/// own capture so concurrent invocations never write into the same buffer.
#[derive(Clone, Debug, Default)]
pub struct OutputCapture {
    inner: Arc<Mutex<Diagnostics>>,
}

impl OutputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, channel: Channel, text: &str) {
        self.lock().channel_mut(channel).push_str(text);
    }

    pub fn write_line(&self, channel: Channel, text: &str) {
        let mut diagnostics = self.lock();
        let buffer = diagnostics.channel_mut(channel);
        buffer.push_str(text);
        buffer.push('\n');
    }

    /// Copy of everything written so far
    pub fn snapshot(&self) -> Diagnostics {
        self.lock().clone()
    }

    /// Drain the buffer, leaving it empty
    pub fn take(&self) -> Diagnostics {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Diagnostics> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
