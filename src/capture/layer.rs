//! `tracing` layer that feeds events into the active capture scope

use std::fmt::{self, Write as _};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use super::buffer::Channel;
use super::scope;

/// Routes every event emitted while a capture scope is active on the
/// emitting thread into that scope's trace channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct CaptureLayer;

impl CaptureLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(capture) = scope::current() else {
            return;
        };

        let mut visitor = EventText::default();
        event.record(&mut visitor);

        let line = format!("[{}] {}", event.metadata().level(), visitor.finish());
        capture.write_line(Channel::Trace, &line);
    }
}

#[derive(Default)]
struct EventText {
    message: String,
    fields: String,
}

impl EventText {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for EventText {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::OutputCapture;
    use tracing_subscriber::prelude::*;

    #[test]
    fn test_events_land_in_active_scope_only() {
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new());
        let capture = OutputCapture::new();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("before scope");
            {
                let _scope = capture.enter();
                tracing::warn!(rows = 3, "inside scope");
            }
            tracing::info!("after scope");
        });

        let trace = capture.snapshot().trace;
        assert_eq!(trace, "[WARN] inside scope rows=3\n");
    }
}
