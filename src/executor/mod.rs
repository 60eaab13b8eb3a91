//! Bounded execution
//!
//! Runs fixture and test bodies under timeout, cancellation and apartment
//! constraints.

mod affinity;
mod bounded;

pub use affinity::{Apartment, PlatformFamily, WorkerKind};
pub use bounded::{BoundedRunner, ExecutionUnit, Interruption, Panic, UnitLabel};
