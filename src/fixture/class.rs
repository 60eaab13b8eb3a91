//! Class scope
//!
//! Lifecycle of one test class:
//! `NotInitialized → Initializing → Ready → CleaningUp → Cleaned`, with a
//! terminal `Failed` state when class (or assembly) initialize fails.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::assembly::AssemblyScope;
use super::graph::FixtureGraph;
use super::invoke::{invoke_static, Call};
use super::{CleanupReport, SetupFailure};
use crate::capture::Diagnostics;
use crate::engine::EngineServices;
use crate::models::{ClassCleanupBehavior, FailureInfo, TestClassInfo, UnitTestOutcome};
use crate::results::Phase;

#[derive(Clone, Debug)]
pub enum ClassState {
    NotInitialized,
    Initializing,
    Ready,
    CleaningUp,
    Cleaned,
    Failed(SetupFailure),
}

impl fmt::Display for ClassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClassState::NotInitialized => "not-initialized",
            ClassState::Initializing => "initializing",
            ClassState::Ready => "ready",
            ClassState::CleaningUp => "cleaning-up",
            ClassState::Cleaned => "cleaned",
            ClassState::Failed(_) => "failed",
        };
        f.write_str(name)
    }
}

pub struct ClassScope {
    class: Arc<TestClassInfo>,
    cleanup_behavior: ClassCleanupBehavior,
    graph: OnceLock<Arc<FixtureGraph>>,
    state: tokio::sync::Mutex<ClassState>,
    remaining: AtomicUsize,
    setup_diagnostics: Mutex<Option<Diagnostics>>,
}

impl ClassScope {
    pub fn new(class: Arc<TestClassInfo>, cleanup_behavior: ClassCleanupBehavior) -> Self {
        Self {
            remaining: AtomicUsize::new(class.methods.len()),
            class,
            cleanup_behavior,
            graph: OnceLock::new(),
            state: tokio::sync::Mutex::new(ClassState::NotInitialized),
            setup_diagnostics: Mutex::new(None),
        }
    }

    pub fn info(&self) -> &Arc<TestClassInfo> {
        &self.class
    }

    pub fn name(&self) -> &str {
        &self.class.name
    }

    pub fn cleanup_behavior(&self) -> ClassCleanupBehavior {
        self.cleanup_behavior
    }

    /// Fixture chains, resolved on first use
    pub fn graph(&self, services: &EngineServices) -> Arc<FixtureGraph> {
        self.graph
            .get_or_init(|| Arc::new(FixtureGraph::resolve(&self.class, services.resolver.as_ref())))
            .clone()
    }

    pub async fn state(&self) -> ClassState {
        self.state.lock().await.clone()
    }

    /// Run class initialize exactly once, after assembly initialize succeeded
    pub async fn ensure_initialized(
        &self,
        assembly: &AssemblyScope,
        services: &EngineServices,
        cancel: &CancellationToken,
    ) -> Result<(), SetupFailure> {
        let mut state = self.state.lock().await;
        match &*state {
            ClassState::Ready => return Ok(()),
            ClassState::Failed(failure) => return Err(failure.clone()),
            ClassState::NotInitialized => {}
            other => {
                return Err(SetupFailure::new(
                    UnitTestOutcome::Error,
                    FailureInfo::new(format!(
                        "Class {} cannot run tests while {}.",
                        self.class.name, other
                    )),
                ))
            }
        }

        if let Err(failure) = assembly.ensure_initialized(services, cancel).await {
            debug!(class = %self.class.name, "assembly initialize failed, class initialize skipped");
            *state = ClassState::Failed(failure.clone());
            return Err(failure);
        }

        *state = ClassState::Initializing;
        let graph = self.graph(services);
        let Some(fixture) = &graph.class_initialize else {
            *state = ClassState::Ready;
            return Ok(());
        };

        info!(class = %self.class.name, method = %fixture.name, "running class initialize");
        let ctx = services.context(&fixture.declaring_type, &fixture.name);
        let call = Call::new(&fixture.declaring_type, &fixture.name, Phase::ClassInitialize)
            .with_timeout(fixture.timeout);
        let failure = invoke_static(services, call, &fixture.body, &ctx, cancel).await;

        let diagnostics = ctx.capture().take();
        if !diagnostics.is_empty() {
            *self
                .setup_diagnostics
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(diagnostics);
        }

        match failure {
            None => {
                *state = ClassState::Ready;
                Ok(())
            }
            Some(classified) => {
                warn!(class = %self.class.name, error = %classified.failure.message, "class initialize failed");
                let failure = SetupFailure::from(classified);
                *state = ClassState::Failed(failure.clone());
                Err(failure)
            }
        }
    }

    /// Output of class initialize, handed out once
    pub fn take_setup_diagnostics(&self) -> Option<Diagnostics> {
        self.setup_diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Record a finished test; true for the last test of the class
    pub fn mark_test_done(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|previous| previous == 1)
            .unwrap_or(false)
    }

    /// Run class cleanup if the class reached `Ready`; otherwise `None`
    pub async fn run_cleanup(&self, services: &EngineServices) -> Option<CleanupReport> {
        let mut state = self.state.lock().await;
        if !matches!(*state, ClassState::Ready) {
            return None;
        }
        *state = ClassState::CleaningUp;

        let graph = self.graph(services);
        let report = match &graph.class_cleanup {
            None => None,
            Some(fixture) => {
                info!(class = %self.class.name, method = %fixture.name, "running class cleanup");
                let ctx = services.context(&fixture.declaring_type, &fixture.name);
                let call = Call::new(&fixture.declaring_type, &fixture.name, Phase::ClassCleanup)
                    .with_timeout(fixture.timeout);
                let failure =
                    invoke_static(services, call, &fixture.body, &ctx, &CancellationToken::new()).await;
                Some(CleanupReport {
                    failure,
                    diagnostics: ctx.capture().take(),
                })
            }
        };

        *state = ClassState::Cleaned;
        report
    }
}
