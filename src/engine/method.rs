//! Test method runner
//!
//! Runs one test method: setup checks, one invocation per data row
//! (instance, test initialize, body, test cleanup), optional retries and
//! aggregation into final result rows.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::services::EngineServices;
use crate::capture::Diagnostics;
use crate::fixture::{
    create_instance, invoke_instance, run_test_cleanup, run_test_initialize, AssemblyScope, Call,
    ClassScope, FixtureGraph,
};
use crate::models::{
    DataRow, InstanceFn, TestMethodInfo, TestResult, UnitTestOutcome, UnitTestResult,
};
use crate::results::{AggregationInput, Classified, Phase, ResultAggregator};
use crate::retry::{is_acceptable, RetryOrchestrator};
use crate::utils::Stopwatch;

/// What one attempt of a test runs
#[derive(Clone, Copy)]
struct Plan<'p> {
    method: &'p TestMethodInfo,
    body: &'p InstanceFn,
    graph: &'p FixtureGraph,
    rows: Option<&'p [DataRow]>,
    timeout: Option<Duration>,
}

/// Runs the test methods of one class
pub struct TestMethodRunner<'a> {
    services: &'a EngineServices,
    assembly: &'a AssemblyScope,
    class: &'a ClassScope,
}

impl<'a> TestMethodRunner<'a> {
    pub fn new(
        services: &'a EngineServices,
        assembly: &'a AssemblyScope,
        class: &'a ClassScope,
    ) -> Self {
        Self {
            services,
            assembly,
            class,
        }
    }

    /// Execute `method`; always yields at least one result
    pub async fn run(&self, method: &TestMethodInfo, cancel: &CancellationToken) -> Vec<TestResult> {
        let resolver = self.services.resolver.as_ref();
        let test_name = method.full_name();

        if resolver.is_ignored(method) {
            info!(test = %test_name, "test ignored");
            return vec![TestResult::new(test_name, UnitTestOutcome::Ignored)];
        }

        let Some(body) = &method.body else {
            let message = format!("Method {test_name} cannot be executed.");
            return vec![TestResult::new(test_name, UnitTestOutcome::NotRunnable).with_message(message)];
        };

        let setup = self
            .class
            .ensure_initialized(self.assembly, self.services, cancel)
            .await;
        let setup_diagnostics = merge_setup(
            self.assembly.take_setup_diagnostics(),
            self.class.take_setup_diagnostics(),
        );

        if let Err(failure) = setup {
            debug!(test = %test_name, "setup failed, synthesizing result");
            return ResultAggregator::aggregate(
                vec![failure.to_unit_result()],
                AggregationInput::new(test_name).with_setup(setup_diagnostics),
            );
        }

        let rows = resolver.data_rows(method);
        let graph = self.class.graph(self.services);
        let plan = Plan {
            method,
            body,
            graph: &graph,
            rows: rows.as_deref(),
            timeout: resolver.timeout(method),
        };

        let first = self.run_attempt(plan, cancel).await;
        let (outcomes, attempt) = match resolver.retry_policy(method) {
            Some(policy) if !is_acceptable(&first) => {
                info!(
                    test = %test_name,
                    max_attempts = policy.max_retry_attempts(),
                    "first attempt failed, retrying"
                );
                let retried = RetryOrchestrator::new(policy)
                    .execute(move |_| self.run_attempt(plan, cancel), cancel)
                    .await;
                debug!(
                    test = %test_name,
                    first = %UnitTestOutcome::aggregate(first.iter().map(|r| r.outcome)),
                    retries = ?retried.outcomes(),
                    "retry history"
                );
                let attempt = retried.len() as u32;
                match retried.into_attempts().pop() {
                    Some(last) => (last, attempt),
                    None => (first, 0),
                }
            }
            _ => (first, 0),
        };

        ResultAggregator::aggregate(
            outcomes,
            AggregationInput::new(test_name)
                .data_driven(rows.is_some())
                .attempt(attempt)
                .with_setup(setup_diagnostics),
        )
    }

    /// One invocation per data row, in input order
    async fn run_attempt(&self, plan: Plan<'_>, cancel: &CancellationToken) -> Vec<UnitTestResult> {
        match plan.rows {
            None => vec![self.run_row(plan, None, cancel).await],
            Some(rows) => {
                let mut outcomes = Vec::with_capacity(rows.len());
                for (index, row) in rows.iter().enumerate() {
                    outcomes.push(self.run_row(plan, Some((index, row)), cancel).await);
                }
                outcomes
            }
        }
    }

    async fn run_row(
        &self,
        plan: Plan<'_>,
        row: Option<(usize, &DataRow)>,
        cancel: &CancellationToken,
    ) -> UnitTestResult {
        let method = plan.method;
        let mut watch = Stopwatch::new();
        let mut ctx = self
            .services
            .context(&method.class_name, &method.name)
            .with_cancellation(cancel.clone());
        if let Some((index, data)) = row {
            ctx = ctx.with_data_row(index, data.clone());
        }

        let mut result = match create_instance(self.services, self.class.info(), &ctx, cancel).await
        {
            Err(failure) => failure.into_unit_result(),
            Ok(instance) => {
                watch.lap("create");
                let mut failure =
                    run_test_initialize(self.services, plan.graph, &instance, &ctx, cancel).await;
                watch.lap("initialize");

                if failure.is_none() {
                    let call = Call::new(&method.class_name, &method.name, Phase::TestMethod)
                        .with_timeout(plan.timeout);
                    failure =
                        invoke_instance(self.services, call, plan.body, &instance, &ctx, cancel)
                            .await;
                    watch.lap("body");
                }

                let cleanup = run_test_cleanup(self.services, plan.graph, &instance, &ctx).await;
                watch.lap("cleanup");
                merge_cleanup(failure, cleanup)
            }
        };

        result.duration = watch.total();
        result.diagnostics = ctx.capture().take();
        result.result_files = ctx.result_files();
        if let Some((index, data)) = row {
            result = result.with_display_name(data.display_for(&method.name));
            result.data_row_index = Some(index);
        }

        debug!(
            test = %method.full_name(),
            row = ?result.data_row_index,
            outcome = %result.outcome,
            timings = %watch.format(),
            "row finished"
        );
        result
    }
}

/// A cleanup failure replaces a passing outcome; otherwise its message is
/// appended to the existing failure.
fn merge_cleanup(body: Option<Classified>, cleanup: Option<Classified>) -> UnitTestResult {
    match (body, cleanup) {
        (None, None) => UnitTestResult::passed(),
        (None, Some(failure)) | (Some(failure), None) => failure.into_unit_result(),
        (Some(failure), Some(cleanup)) => {
            let mut result = failure.into_unit_result();
            if let Some(info) = result.failure.as_mut() {
                info.message.push('\n');
                info.message.push_str(&cleanup.failure.message);
            }
            result
        }
    }
}

fn merge_setup(assembly: Option<Diagnostics>, class: Option<Diagnostics>) -> Option<Diagnostics> {
    match (assembly, class) {
        (Some(mut assembly), Some(class)) => {
            assembly.append(&class);
            Some(assembly)
        }
        (assembly, class) => assembly.or(class),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{TestClassBuilder, TestMethodBuilder};
    use crate::models::{AssemblyInfo, Assert, ClassCleanupBehavior, TestClassInfo, TestError};
    use crate::retry::{BackoffKind, RetryPolicy};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    struct Calculator;

    async fn run(class: TestClassInfo, method: usize) -> Vec<TestResult> {
        let class = Arc::new(class);
        let services = EngineServices::default();
        let assembly = AssemblyScope::new(Arc::new(AssemblyInfo::new("Calc")));
        let scope = ClassScope::new(class.clone(), ClassCleanupBehavior::EndOfClass);
        TestMethodRunner::new(&services, &assembly, &scope)
            .run(&class.methods[method], &CancellationToken::new())
            .await
    }

    #[tokio::test]
    async fn test_passing_test_keeps_only_its_output() {
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .test_initialize("setup", |_, ctx| {
                ctx.write_line("init");
                Ok(())
            })
            .test("adds", |_, ctx| {
                ctx.write_line("adding");
                Assert::are_equal(4, 2 + 2)
            })
            .test_cleanup("teardown", |_, ctx| {
                ctx.write_line("cleanup");
                Ok(())
            })
            .build();

        let results = run(class, 0).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, UnitTestOutcome::Passed);
        assert_eq!(results[0].row_index, -1);
        assert_eq!(results[0].stdout, "init\nadding\ncleanup\n");
        assert_eq!(results[0].attempt, 0);
    }

    #[tokio::test]
    async fn test_ignored_and_not_runnable() {
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .method(TestMethodBuilder::new("skipped", |_, _| Ok(())).ignore())
            .method(TestMethodBuilder::without_body("broken"))
            .build();
        let class = Arc::new(class);
        let services = EngineServices::default();
        let assembly = AssemblyScope::new(Arc::new(AssemblyInfo::new("Calc")));
        let scope = ClassScope::new(class.clone(), ClassCleanupBehavior::EndOfClass);
        let runner = TestMethodRunner::new(&services, &assembly, &scope);
        let cancel = CancellationToken::new();

        let ignored = runner.run(&class.methods[0], &cancel).await;
        assert_eq!(ignored[0].outcome, UnitTestOutcome::Ignored);

        let broken = runner.run(&class.methods[1], &cancel).await;
        assert_eq!(broken[0].outcome, UnitTestOutcome::NotRunnable);
        assert_eq!(
            broken[0].error_message.as_deref(),
            Some("Method CalcTests.broken cannot be executed.")
        );
    }

    #[tokio::test]
    async fn test_data_rows_with_one_failure() {
        let rows = (0..4).map(|i| DataRow::new(vec![json!(i)])).collect();
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .method(
                TestMethodBuilder::new("is_small", |_, ctx| {
                    let value = ctx.arg(0).and_then(|v| v.as_i64()).unwrap_or_default();
                    ctx.write_line(format!("value {value}"));
                    Assert::is_true(value != 2, "two is not small")
                })
                .data_rows(rows),
            )
            .build();

        let results = run(class, 0).await;
        assert_eq!(results.len(), 4);
        let indices: Vec<i32> = results.iter().map(|r| r.row_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(results[2].outcome, UnitTestOutcome::Failed);
        assert_eq!(results[2].display_name, "is_small (2)");
        assert_eq!(results[3].stdout, "value 3\n");

        let outcomes = results.iter().map(|r| r.outcome);
        assert_eq!(UnitTestOutcome::aggregate(outcomes), UnitTestOutcome::Failed);
    }

    #[tokio::test]
    async fn test_zero_rows_yields_no_result() {
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .method(TestMethodBuilder::new("empty", |_, _| Ok(())).data_rows(Vec::new()))
            .build();

        let results = run(class, 0).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, UnitTestOutcome::Error);
    }

    #[tokio::test]
    async fn test_timeout_duration_tracks_the_bound() {
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .method(
                TestMethodBuilder::new("spins", |_, ctx| {
                    let start = Instant::now();
                    while !ctx.is_cancellation_requested() && start.elapsed() < Duration::from_secs(2)
                    {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    Ok(())
                })
                .timeout(Duration::from_millis(50)),
            )
            .build();

        let results = run(class, 0).await;
        assert_eq!(results[0].outcome, UnitTestOutcome::Timeout);
        assert!(results[0].duration_ms >= 50);
        assert!(results[0].duration_ms < 1000);
        assert_eq!(
            results[0].error_message.as_deref(),
            Some("Method CalcTests.spins exceeded its timeout of 50 ms.")
        );
    }

    #[tokio::test]
    async fn test_flaky_test_passes_on_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let policy = RetryPolicy::new(3, Duration::from_millis(10), BackoffKind::Constant).unwrap();
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .method(
                TestMethodBuilder::new("flaky", move |_, _| {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TestError::unexpected("not yet"))
                    } else {
                        Ok(())
                    }
                })
                .retry(policy),
            )
            .build();

        let results = run(class, 0).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(results[0].outcome, UnitTestOutcome::Passed);
        assert_eq!(results[0].attempt, 2);
    }

    #[tokio::test]
    async fn test_retry_reruns_every_data_row() {
        let calls = Arc::new(AtomicU32::new(0));
        let flaked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (counter, flag) = (calls.clone(), flaked.clone());
        let policy = RetryPolicy::new(3, Duration::from_millis(10), BackoffKind::Constant).unwrap();
        let rows = (0..3).map(|i| DataRow::new(vec![json!(i)])).collect();
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .method(
                TestMethodBuilder::new("checks_row", move |_, ctx| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let value = ctx.arg(0).and_then(|v| v.as_i64()).unwrap_or_default();
                    ctx.write_line(format!("row {value}"));
                    if value == 1 && !flag.swap(true, Ordering::SeqCst) {
                        return Err(TestError::unexpected("flaky row"));
                    }
                    Ok(())
                })
                .data_rows(rows)
                .retry(policy),
            )
            .build();

        let results = run(class, 0).await;
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(results.len(), 3);
        let indices: Vec<i32> = results.iter().map(|r| r.row_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(results.iter().all(|r| r.outcome == UnitTestOutcome::Passed));
        assert!(results.iter().all(|r| r.attempt == 1));
        assert_eq!(results[1].stdout, "row 1\n");
    }

    #[tokio::test]
    async fn test_cleanup_failure_marks_passing_test_failed() {
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .test("adds", |_, _| Ok(()))
            .test_cleanup("teardown", |_, _| Err(TestError::unexpected("leak")))
            .build();

        let results = run(class, 0).await;
        assert_eq!(results[0].outcome, UnitTestOutcome::Failed);
        assert_eq!(
            results[0].error_message.as_deref(),
            Some("Cleanup method CalcTests.teardown threw exception: leak")
        );
    }

    #[tokio::test]
    async fn test_cleanup_failure_appends_to_body_failure() {
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .test("adds", |_, _| Assert::fail("wrong sum"))
            .test_cleanup("teardown", |_, _| Err(TestError::unexpected("leak")))
            .build();

        let results = run(class, 0).await;
        assert_eq!(
            results[0].error_message.as_deref(),
            Some("wrong sum\nCleanup method CalcTests.teardown threw exception: leak")
        );
    }

    #[tokio::test]
    async fn test_instance_creation_failure() {
        let class = TestClassBuilder::new("CalcTests", |_| -> Result<Calculator, TestError> {
            Err(TestError::unexpected("no memory"))
        })
        .test("adds", |_, _| Ok(()))
        .build();

        let results = run(class, 0).await;
        assert_eq!(results[0].outcome, UnitTestOutcome::Failed);
        assert_eq!(
            results[0].error_message.as_deref(),
            Some("Unable to create instance of class CalcTests. Error: no memory")
        );
    }

    #[tokio::test]
    async fn test_class_initialize_failure_is_synthesized() {
        let class = TestClassBuilder::new("CalcTests", |_| Ok(Calculator))
            .class_initialize("boot", |ctx| {
                ctx.write_line("booting");
                Err(TestError::unexpected("no power"))
            })
            .test("adds", |_, _| Ok(()))
            .build();

        let results = run(class, 0).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, UnitTestOutcome::Failed);
        assert_eq!(
            results[0].error_message.as_deref(),
            Some("Class initialization method CalcTests.boot threw exception: no power")
        );
        assert_eq!(results[0].stdout, "booting\n");
    }
}
