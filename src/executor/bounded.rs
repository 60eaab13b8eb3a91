//! Bounded execution
//!
//! Runs one unit of work (a fixture or a test body) under an optional
//! timeout and a cancellation token. The runner arbitrates timeout,
//! cancellation and apartment selection only; whatever the unit returns or
//! panics with is handed back untouched for classification.

use anyhow::{Context, Result};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::affinity::{Apartment, PlatformFamily, WorkerKind};
use crate::capture::OutputCapture;

/// Payload of a panic raised by a unit
pub type Panic = Box<dyn Any + Send + 'static>;

/// Identifies the method a unit invokes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitLabel {
    pub declaring_type: String,
    pub method: String,
}

impl UnitLabel {
    pub fn new(declaring_type: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for UnitLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.method)
    }
}

/// A unit stopped waiting before it produced a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Interruption {
    #[error("{message}")]
    TimedOut { message: String, timeout: Duration },

    #[error("{message}")]
    Cancelled { message: String },
}

impl Interruption {
    pub fn timed_out(label: &UnitLabel, timeout: Duration) -> Self {
        Interruption::TimedOut {
            message: format!(
                "Method {} exceeded its timeout of {} ms.",
                label,
                timeout.as_millis()
            ),
            timeout,
        }
    }

    pub fn cancelled(label: &UnitLabel) -> Self {
        Interruption::Cancelled {
            message: format!("Method {label} was cancelled before it completed."),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Interruption::TimedOut { message, .. } | Interruption::Cancelled { message } => message,
        }
    }
}

/// One invocation to run under bounds
pub struct ExecutionUnit<F> {
    pub label: UnitLabel,
    pub timeout: Option<Duration>,
    pub cancellation: CancellationToken,
    /// Apartment of the thread that created the unit
    pub affinity: Apartment,
    /// Capture scope entered on whichever thread runs the work
    pub capture: Option<OutputCapture>,
    pub work: F,
}

impl<F> ExecutionUnit<F> {
    pub fn new(label: UnitLabel, cancellation: CancellationToken, work: F) -> Self {
        Self {
            label,
            timeout: None,
            cancellation,
            affinity: Apartment::current(),
            capture: None,
            work,
        }
    }

    /// Zero is treated as "no timeout"
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn with_capture(mut self, capture: OutputCapture) -> Self {
        self.capture = Some(capture);
        self
    }
}

/// Executes units with timeout, cancellation and apartment arbitration
#[derive(Clone, Copy, Debug)]
pub struct BoundedRunner {
    platform: PlatformFamily,
}

impl Default for BoundedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundedRunner {
    pub fn new() -> Self {
        Self {
            platform: PlatformFamily::current(),
        }
    }

    pub fn with_platform(platform: PlatformFamily) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> PlatformFamily {
        self.platform
    }

    /// Run `unit`, returning its value (or panic) unless it was interrupted
    pub async fn run<F, R>(&self, unit: ExecutionUnit<F>) -> Result<Result<R, Panic>, Interruption>
    where
        F: FnOnce(CancellationToken) -> R + Send + 'static,
        R: Send + 'static,
    {
        match unit.timeout {
            None => run_inline(unit),
            Some(timeout) => self.run_with_timeout(unit, timeout).await,
        }
    }

    async fn run_with_timeout<F, R>(
        &self,
        unit: ExecutionUnit<F>,
        timeout: Duration,
    ) -> Result<Result<R, Panic>, Interruption>
    where
        F: FnOnce(CancellationToken) -> R + Send + 'static,
        R: Send + 'static,
    {
        let ExecutionUnit {
            label,
            cancellation,
            affinity,
            capture,
            work,
            ..
        } = unit;

        if cancellation.is_cancelled() {
            return Err(Interruption::cancelled(&label));
        }

        let worker_token = cancellation.child_token();
        let token_for_work = worker_token.clone();
        let dispatch = tracing::dispatcher::get_default(|current| current.clone());
        let (reply_tx, reply_rx) = oneshot::channel();

        let job = move || {
            let outcome = tracing::dispatcher::with_default(&dispatch, || {
                let _scope = capture.as_ref().map(OutputCapture::enter);
                panic::catch_unwind(AssertUnwindSafe(|| work(token_for_work)))
            });
            let _ = reply_tx.send(outcome);
        };

        let kind = WorkerKind::select(self.platform, affinity);
        debug!(unit = %label, ?kind, timeout_ms = timeout.as_millis() as u64, "dispatching bounded unit");

        if let Err(e) = spawn_worker(kind, &label, job) {
            warn!(unit = %label, error = %e, "failed to schedule bounded unit");
            return Err(Interruption::cancelled(&label));
        }

        tokio::select! {
            biased;
            reply = reply_rx => reply.map_err(|_| Interruption::cancelled(&label)),
            _ = tokio::time::sleep(timeout) => {
                worker_token.cancel();
                warn!(unit = %label, timeout_ms = timeout.as_millis() as u64, "unit timed out, abandoning worker");
                Err(Interruption::timed_out(&label, timeout))
            }
            _ = cancellation.cancelled() => {
                worker_token.cancel();
                debug!(unit = %label, "unit cancelled");
                Err(Interruption::cancelled(&label))
            }
        }
    }
}

fn run_inline<F, R>(unit: ExecutionUnit<F>) -> Result<Result<R, Panic>, Interruption>
where
    F: FnOnce(CancellationToken) -> R,
{
    if unit.cancellation.is_cancelled() {
        return Err(Interruption::cancelled(&unit.label));
    }

    let ExecutionUnit {
        cancellation,
        capture,
        work,
        ..
    } = unit;

    let _scope = capture.as_ref().map(OutputCapture::enter);
    Ok(panic::catch_unwind(AssertUnwindSafe(|| work(cancellation))))
}

fn spawn_worker<J>(kind: WorkerKind, label: &UnitLabel, job: J) -> Result<()>
where
    J: FnOnce() + Send + 'static,
{
    match kind {
        WorkerKind::Background => {
            tokio::runtime::Handle::try_current()
                .context("No async runtime available to time the worker")?;
            // Detached so an abandoned worker never holds up runtime shutdown
            std::thread::Builder::new()
                .name(format!("worker-{label}"))
                .spawn(job)
                .context("Failed to spawn worker thread")?;
        }
        WorkerKind::DedicatedAffine => {
            tokio::runtime::Handle::try_current()
                .context("No async runtime available to time the worker")?;
            std::thread::Builder::new()
                .name(format!("sta-{label}"))
                .spawn(move || {
                    Apartment::SingleThreaded.bind_current_thread();
                    job();
                })
                .context("Failed to spawn apartment thread")?;
        }
    }
    Ok(())
}
