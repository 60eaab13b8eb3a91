//! Assembly scope
//!
//! Assembly initialize runs at most once per run; its outcome is cached and
//! handed to every test that asks. Assembly cleanup runs at most once, and
//! only after a successful initialize.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::invoke::{invoke_static, Call};
use super::{CleanupReport, SetupFailure};
use crate::capture::Diagnostics;
use crate::engine::EngineServices;
use crate::models::AssemblyInfo;
use crate::results::Phase;

pub struct AssemblyScope {
    assembly: Arc<AssemblyInfo>,
    init: OnceCell<Result<(), SetupFailure>>,
    setup_diagnostics: Mutex<Option<Diagnostics>>,
    cleaned: AtomicBool,
}

impl AssemblyScope {
    pub fn new(assembly: Arc<AssemblyInfo>) -> Self {
        Self {
            assembly,
            init: OnceCell::new(),
            setup_diagnostics: Mutex::new(None),
            cleaned: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.assembly.name
    }

    pub fn is_initialized(&self) -> bool {
        self.init.initialized()
    }

    /// Run assembly initialize once; later calls return the cached outcome
    pub async fn ensure_initialized(
        &self,
        services: &EngineServices,
        cancel: &CancellationToken,
    ) -> Result<(), SetupFailure> {
        self.init
            .get_or_init(|| self.initialize(services, cancel))
            .await
            .clone()
    }

    async fn initialize(
        &self,
        services: &EngineServices,
        cancel: &CancellationToken,
    ) -> Result<(), SetupFailure> {
        let Some(fixture) = &self.assembly.initialize else {
            return Ok(());
        };

        info!(assembly = %self.assembly.name, method = %fixture.name, "running assembly initialize");
        let ctx = services.context(&fixture.declaring_type, &fixture.name);
        let call = Call::new(&fixture.declaring_type, &fixture.name, Phase::AssemblyInitialize)
            .with_timeout(
                services
                    .resolver
                    .fixture_timeout(Phase::AssemblyInitialize, fixture.timeout),
            );

        let failure = invoke_static(services, call, &fixture.body, &ctx, cancel).await;
        self.store_diagnostics(ctx.capture().take());

        match failure {
            None => Ok(()),
            Some(classified) => {
                warn!(assembly = %self.assembly.name, error = %classified.failure.message, "assembly initialize failed");
                Err(SetupFailure::from(classified))
            }
        }
    }

    fn store_diagnostics(&self, diagnostics: Diagnostics) {
        if diagnostics.is_empty() {
            return;
        }
        *self
            .setup_diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(diagnostics);
    }

    /// Output of assembly initialize, handed out once to the first caller
    pub fn take_setup_diagnostics(&self) -> Option<Diagnostics> {
        self.setup_diagnostics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Run assembly cleanup. `None` when it must not run (never initialized,
    /// initialize failed, or already cleaned up).
    pub async fn run_cleanup(&self, services: &EngineServices) -> Option<CleanupReport> {
        if !matches!(self.init.get(), Some(Ok(()))) {
            return None;
        }
        if self.cleaned.swap(true, Ordering::SeqCst) {
            return None;
        }
        let fixture = self.assembly.cleanup.as_ref()?;

        info!(assembly = %self.assembly.name, method = %fixture.name, "running assembly cleanup");
        let ctx = services.context(&fixture.declaring_type, &fixture.name);
        let call = Call::new(&fixture.declaring_type, &fixture.name, Phase::AssemblyCleanup)
            .with_timeout(
                services
                    .resolver
                    .fixture_timeout(Phase::AssemblyCleanup, fixture.timeout),
            );

        let failure = invoke_static(services, call, &fixture.body, &ctx, &CancellationToken::new()).await;
        Some(CleanupReport {
            failure,
            diagnostics: ctx.capture().take(),
        })
    }
}
