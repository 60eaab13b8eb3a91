//! Output capture
//!
//! Diagnostic text written by test code is collected per execution scope.
//! Writes reach a scope either through an explicit handle carried by the
//! test context or through the `tracing` hook, which looks up the scope
//! active on the emitting thread.

mod buffer;
mod layer;
mod scope;

pub use buffer::{Channel, Diagnostics, OutputCapture};
pub use layer::CaptureLayer;
pub use scope::{current, write_ambient, CaptureScope};
