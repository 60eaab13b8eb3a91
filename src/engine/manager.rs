//! Assembly execution
//!
//! Drives every class of an assembly, sequentially or with bounded
//! parallelism, and runs class and assembly cleanup at the time their
//! cleanup behavior dictates.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::method::TestMethodRunner;
use super::services::EngineServices;
use crate::fixture::{AssemblyScope, ClassScope, CleanupReport};
use crate::models::{
    AssemblyInfo, ClassCleanupBehavior, RunSummary, TestResult, UnitTestOutcome,
};
use crate::results::ResultAggregator;
use crate::utils::Timer;

/// Outcome of one assembly run
#[derive(Clone, Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

/// Runs test assemblies
pub struct TestExecutionManager {
    services: Arc<EngineServices>,
}

impl TestExecutionManager {
    pub fn new(services: EngineServices) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn services(&self) -> &EngineServices {
        &self.services
    }

    /// Run every test of `assembly`; each test yields at least one result
    pub async fn run_assembly(
        &self,
        assembly: Arc<AssemblyInfo>,
        cancel: CancellationToken,
    ) -> RunReport {
        let started_at = Utc::now();
        let timer = Timer::start(format!("assembly {}", assembly.name));
        info!(
            assembly = %assembly.name,
            classes = assembly.classes.len(),
            tests = assembly.test_count(),
            "starting run"
        );

        let scope = Arc::new(AssemblyScope::new(assembly.clone()));
        let classes: Vec<Arc<ClassScope>> = assembly
            .classes
            .iter()
            .map(|class| {
                let behavior = self.services.resolver.cleanup_behavior(class);
                Arc::new(ClassScope::new(class.clone(), behavior))
            })
            .collect();

        let parallel = &self.services.config.parallel;
        let mut per_class = if parallel.enabled && classes.len() > 1 {
            self.run_parallel(&scope, &classes, parallel.workers, &cancel)
                .await
        } else {
            let mut per_class = Vec::with_capacity(classes.len());
            for class in &classes {
                per_class.push(run_class(&self.services, &scope, class, &cancel).await);
            }
            per_class
        };

        for (class, results) in classes.iter().zip(per_class.iter_mut()) {
            if let Some(report) = class.run_cleanup(&self.services).await {
                debug!(class = %class.name(), "deferred class cleanup finished");
                apply_cleanup(&self.services, results, report);
            }
        }

        let mut results: Vec<TestResult> = per_class.into_iter().flatten().collect();
        if let Some(report) = scope.run_cleanup(&self.services).await {
            apply_cleanup(&self.services, &mut results, report);
        }

        let summary = RunSummary::new(assembly.name.clone(), results);
        let duration = timer.stop();
        info!(
            assembly = %summary.assembly,
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            duration_ms = duration.as_millis() as u64,
            "run finished - pass rate {:.1}%",
            summary.pass_rate()
        );

        RunReport {
            summary,
            started_at,
            duration,
        }
    }

    async fn run_parallel(
        &self,
        scope: &Arc<AssemblyScope>,
        classes: &[Arc<ClassScope>],
        workers: usize,
        cancel: &CancellationToken,
    ) -> Vec<Vec<TestResult>> {
        info!(classes = classes.len(), workers, "running classes in parallel");
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));

        let handles: Vec<_> = classes
            .iter()
            .map(|class| {
                let semaphore = semaphore.clone();
                let services = self.services.clone();
                let scope = scope.clone();
                let class = class.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    run_class(&services, &scope, &class, &cancel).await
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(classes)
            .map(|(joined, class)| match joined {
                Ok(results) => results,
                Err(e) => {
                    error!(class = %class.name(), error = %e, "class task failed");
                    class
                        .info()
                        .methods
                        .iter()
                        .map(|method| {
                            TestResult::new(method.full_name(), UnitTestOutcome::Error)
                                .with_message(format!("Class {} did not complete: {e}", class.name()))
                        })
                        .collect()
                }
            })
            .collect()
    }
}

/// Run the tests of one class in declaration order
async fn run_class(
    services: &EngineServices,
    assembly: &AssemblyScope,
    class: &ClassScope,
    cancel: &CancellationToken,
) -> Vec<TestResult> {
    debug!(class = %class.name(), behavior = ?class.cleanup_behavior(), "running class");
    let runner = TestMethodRunner::new(services, assembly, class);
    let mut results = Vec::new();

    for method in &class.info().methods {
        let mut method_results = runner.run(method, cancel).await;

        if class.mark_test_done() && class.cleanup_behavior() == ClassCleanupBehavior::EndOfClass {
            if let Some(report) = class.run_cleanup(services).await {
                apply_cleanup(services, &mut method_results, report);
            }
        }
        results.extend(method_results);
    }
    results
}

/// Attach cleanup output to the last result and report a cleanup failure
fn apply_cleanup(services: &EngineServices, results: &mut [TestResult], report: CleanupReport) {
    ResultAggregator::attach_cleanup(results, &report.diagnostics);

    let Some(failure) = report.failure else {
        return;
    };
    let message = failure.failure.message;
    services.sink.warn(&message);

    if !services.config.treat_cleanup_warnings_as_errors {
        return;
    }
    if let Some(last) = results.last_mut() {
        last.outcome = UnitTestOutcome::Failed;
        last.error_message = Some(match last.error_message.take() {
            Some(existing) => format!("{existing}\n{message}"),
            None => message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureLayer;
    use crate::config::EngineConfig;
    use crate::metadata::{TestClassBuilder, TestMethodBuilder};
    use crate::models::{FixtureMethod, TestError};
    use crate::utils::MemorySink;
    use std::sync::Mutex;
    use tracing_subscriber::prelude::*;

    struct Fixture;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn note(journal: &Journal, entry: &str) {
        journal.lock().unwrap().push(entry.to_string());
    }

    fn journaled_class(name: &'static str, behavior: ClassCleanupBehavior, journal: &Journal) -> crate::models::TestClassInfo {
        let in_test = journal.clone();
        let in_cleanup = journal.clone();
        TestClassBuilder::new(name, |_| Ok(Fixture))
            .cleanup_behavior(behavior)
            .test("runs", move |_, _| {
                note(&in_test, &format!("{name}.test"));
                Ok(())
            })
            .class_cleanup("teardown", move |_| {
                note(&in_cleanup, &format!("{name}.cleanup"));
                Ok(())
            })
            .build()
    }

    #[tokio::test]
    async fn test_cleanup_timing_follows_behavior() {
        let journal: Journal = Arc::default();
        let in_cleanup = journal.clone();
        let assembly = AssemblyInfo::new("Suite")
            .with_class(journaled_class("Late", ClassCleanupBehavior::EndOfAssembly, &journal))
            .with_class(journaled_class("Early", ClassCleanupBehavior::EndOfClass, &journal))
            .with_cleanup(FixtureMethod::new("Suite", "cleanup", move |_| {
                note(&in_cleanup, "assembly.cleanup");
                Ok(())
            }));

        let report = TestExecutionManager::new(EngineServices::default())
            .run_assembly(Arc::new(assembly), CancellationToken::new())
            .await;

        assert_eq!(report.summary.total, 2);
        assert!(report.summary.is_all_passed());
        assert_eq!(
            *journal.lock().unwrap(),
            vec![
                "Late.test",
                "Early.test",
                "Early.cleanup",
                "Late.cleanup",
                "assembly.cleanup"
            ]
        );
    }

    #[tokio::test]
    async fn test_class_cleanup_failure_is_a_warning_by_default() {
        let sink = Arc::new(MemorySink::new());
        let assembly = AssemblyInfo::new("Suite").with_class(
            TestClassBuilder::new("Store", |_| Ok(Fixture))
                .test("saves", |_, _| Ok(()))
                .class_cleanup("drop_tables", |ctx| {
                    ctx.write_line("dropping");
                    Err(TestError::unexpected("tables locked"))
                })
                .build(),
        );

        let report = TestExecutionManager::new(EngineServices::default().with_sink(sink.clone()))
            .run_assembly(Arc::new(assembly), CancellationToken::new())
            .await;

        let result = &report.summary.results[0];
        assert_eq!(result.outcome, UnitTestOutcome::Passed);
        assert_eq!(result.stdout, "dropping\n");
        assert_eq!(
            sink.warnings(),
            vec!["Class cleanup method Store.drop_tables threw exception: tables locked".to_string()]
        );
    }

    #[tokio::test]
    async fn test_cleanup_warnings_as_errors() {
        let config = EngineConfig {
            treat_cleanup_warnings_as_errors: true,
            ..Default::default()
        };
        let assembly = AssemblyInfo::new("Suite").with_class(
            TestClassBuilder::new("Store", |_| Ok(Fixture))
                .test("loads", |_, _| Ok(()))
                .test("saves", |_, _| Ok(()))
                .class_cleanup("drop_tables", |_| Err(TestError::unexpected("tables locked")))
                .build(),
        );

        let report = TestExecutionManager::new(EngineServices::new(config))
            .run_assembly(Arc::new(assembly), CancellationToken::new())
            .await;

        let results = &report.summary.results;
        assert_eq!(results[0].outcome, UnitTestOutcome::Passed);
        assert_eq!(results[1].outcome, UnitTestOutcome::Failed);
        assert_eq!(
            results[1].error_message.as_deref(),
            Some("Class cleanup method Store.drop_tables threw exception: tables locked")
        );
    }

    #[tokio::test]
    async fn test_assembly_initialize_failure_reaches_every_test() {
        let journal: Journal = Arc::default();
        let in_cleanup = journal.clone();
        let assembly = AssemblyInfo::new("Suite")
            .with_initialize(FixtureMethod::new("Suite", "init", |_| {
                Err(TestError::unexpected("no network"))
            }))
            .with_cleanup(FixtureMethod::new("Suite", "cleanup", move |_| {
                note(&in_cleanup, "assembly.cleanup");
                Ok(())
            }))
            .with_class(journaled_class("First", ClassCleanupBehavior::EndOfClass, &journal))
            .with_class(journaled_class("Second", ClassCleanupBehavior::EndOfAssembly, &journal));

        let report = TestExecutionManager::new(EngineServices::default())
            .run_assembly(Arc::new(assembly), CancellationToken::new())
            .await;

        assert_eq!(report.summary.failed, 2);
        for result in &report.summary.results {
            assert_eq!(
                result.error_message.as_deref(),
                Some("Assembly initialization method Suite.init threw exception: no network")
            );
        }
        assert!(journal.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parallel_classes_keep_their_own_output() {
        let subscriber = tracing_subscriber::registry().with(CaptureLayer::new());
        let _default = tracing::subscriber::set_default(subscriber);

        let chatty = |name: &'static str| {
            TestClassBuilder::new(name, |_| Ok(Fixture))
                .method(
                    TestMethodBuilder::new("talks", move |_, ctx| {
                        for i in 0..5 {
                            ctx.write_line(format!("{name} {i}"));
                            tracing::info!("{name} traced {i}");
                            std::thread::sleep(Duration::from_millis(10));
                        }
                        Ok(())
                    })
                    .timeout(Duration::from_secs(5)),
                )
                .build()
        };

        let mut config = EngineConfig::default();
        config.parallel.enabled = true;
        config.parallel.workers = 2;
        let assembly = AssemblyInfo::new("Suite")
            .with_class(chatty("alpha"))
            .with_class(chatty("beta"));

        let report = TestExecutionManager::new(EngineServices::new(config))
            .run_assembly(Arc::new(assembly), CancellationToken::new())
            .await;

        assert!(report.summary.is_all_passed());
        for (result, own, other) in [
            (&report.summary.results[0], "alpha", "beta"),
            (&report.summary.results[1], "beta", "alpha"),
        ] {
            assert_eq!(result.stdout.lines().count(), 5);
            assert!(result.stdout.lines().all(|l| l.starts_with(own)));
            assert_eq!(result.trace.lines().count(), 5);
            assert!(result.trace.contains(&format!("{own} traced 4")));
            assert!(!result.stdout.contains(other));
            assert!(!result.trace.contains(other));
        }
    }

    #[tokio::test]
    async fn test_cancelled_run_still_reports_every_test() {
        let assembly = AssemblyInfo::new("Suite").with_class(
            TestClassBuilder::new("Slow", |_| Ok(Fixture))
                .test("one", |_, _| Ok(()))
                .test("two", |_, _| Ok(()))
                .build(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = TestExecutionManager::new(EngineServices::default())
            .run_assembly(Arc::new(assembly), cancel)
            .await;

        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.timeouts, 2);
    }
}
