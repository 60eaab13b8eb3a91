//! Built-in sample assembly
//!
//! A small assembly exercising every outcome the engine produces. The CLI
//! runs it and lists it.

use anyhow::{anyhow, Context};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::metadata::{LevelBuilder, TestClassBuilder, TestMethodBuilder};
use crate::models::{
    AssemblyInfo, Assert, ClassCleanupBehavior, DataRow, FixtureMethod, TestClassInfo, TestError,
};
use crate::retry::{BackoffKind, RetryPolicy};

pub const SAMPLE_ASSEMBLY: &str = "Samples";

/// The sample assembly, with fresh state
pub fn sample_assembly() -> AssemblyInfo {
    AssemblyInfo::new(SAMPLE_ASSEMBLY)
        .with_initialize(FixtureMethod::new(SAMPLE_ASSEMBLY, "start", |ctx| {
            ctx.write_line("sample assembly ready");
            Ok(())
        }))
        .with_cleanup(FixtureMethod::new(SAMPLE_ASSEMBLY, "stop", |ctx| {
            ctx.write_line("sample assembly done");
            Ok(())
        }))
        .with_class(calculator_tests())
        .with_class(network_tests())
        .with_class(inventory_tests())
        .with_class(reporting_tests())
}

struct Calculator;

impl Calculator {
    fn add(&self, a: i64, b: i64) -> i64 {
        a + b
    }

    fn divide(&self, a: i64, b: i64) -> anyhow::Result<i64> {
        a.checked_div(b)
            .ok_or_else(|| anyhow!("attempt to divide by zero"))
            .with_context(|| format!("dividing {a} by {b}"))
    }
}

fn int_arg(ctx: &crate::models::TestContext, index: usize) -> Result<i64, TestError> {
    ctx.arg(index)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| TestError::assert_failed(format!("argument {index} is not an integer")))
}

fn calculator_tests() -> TestClassInfo {
    TestClassBuilder::new("CalculatorTests", |_| Ok(Calculator))
        .cleanup_behavior(ClassCleanupBehavior::EndOfClass)
        .class_initialize("load_tables", |ctx| {
            ctx.write_line("lookup tables loaded");
            Ok(())
        })
        .class_cleanup("unload_tables", |ctx| {
            ctx.write_line("lookup tables released");
            Ok(())
        })
        .test_initialize("reset", |_, ctx| {
            ctx.trace_line("calculator reset");
            Ok(())
        })
        .test("adds", |calc, _| Assert::are_equal(5, calc.add(2, 3)))
        .method(
            TestMethodBuilder::new("divides", |calc: &Calculator, ctx| {
                let (a, b, expected) = (int_arg(ctx, 0)?, int_arg(ctx, 1)?, int_arg(ctx, 2)?);
                ctx.write_line(format!("{a} / {b}"));
                Assert::are_equal(expected, calc.divide(a, b)?)
            })
            .data_row(DataRow::new(vec![json!(6), json!(3), json!(2)]))
            .data_row(DataRow::new(vec![json!(9), json!(3), json!(3)]))
            .data_row(DataRow::new(vec![json!(1), json!(0), json!(0)]).named("divides by zero")),
        )
        .method(
            TestMethodBuilder::new("multiplies_large", |_, _| Assert::fail("not implemented"))
                .ignore(),
        )
        .test("square_root_of_negative", |_, _| {
            Assert::inconclusive("complex results are not supported yet")
        })
        .build()
}

fn network_tests() -> TestClassInfo {
    let connects = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(3, Duration::from_millis(20), BackoffKind::Exponential);

    let mut reconnects = TestMethodBuilder::new("reconnects", move |_, ctx| {
        let attempt = connects.fetch_add(1, Ordering::SeqCst) + 1;
        ctx.write_line(format!("connection attempt {attempt}"));
        if attempt < 3 {
            return Err(TestError::unexpected("connection reset by peer"));
        }
        Ok(())
    });
    if let Ok(policy) = policy {
        reconnects = reconnects.retry(policy);
    }

    TestClassBuilder::new("NetworkTests", |_| Ok(()))
        .method(reconnects)
        .method(
            TestMethodBuilder::new("hangs", |_, ctx| {
                let start = Instant::now();
                while !ctx.is_cancellation_requested() && start.elapsed() < Duration::from_secs(5) {
                    std::thread::sleep(Duration::from_millis(10));
                }
                Ok(())
            })
            .timeout(Duration::from_millis(100)),
        )
        .method(TestMethodBuilder::without_body("legacy_handshake"))
        .build()
}

#[derive(Default)]
struct Inventory {
    items: Mutex<Vec<&'static str>>,
}

impl Inventory {
    fn stock(&self, item: &'static str) {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(item);
    }

    fn count(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn inventory_tests() -> TestClassInfo {
    TestClassBuilder::new("InventoryTests", |_| Ok(Inventory::default()))
        .base(
            LevelBuilder::new("RepositoryBase")
                .test_initialize("open_connection", |_: &Inventory, ctx| {
                    ctx.write_line("connection opened");
                    Ok(())
                })
                .test_cleanup("close_connection", |_: &Inventory, ctx| {
                    ctx.write_line("connection closed");
                    Ok(())
                }),
        )
        .test_initialize("seed", |inventory, _| {
            for item in ["bolt", "nut", "washer"] {
                inventory.stock(item);
            }
            Ok(())
        })
        .disposer(|_, ctx| {
            ctx.trace_line("inventory disposed");
            Ok(())
        })
        .test("counts_items", |inventory, _| {
            tracing::info!(items = inventory.count(), "counted inventory");
            Assert::are_equal(3, inventory.count())
        })
        .test("panics_on_empty", |_, _| panic!("inventory is empty"))
        .build()
}

fn reporting_tests() -> TestClassInfo {
    TestClassBuilder::new("ReportingTests", |_| Ok(()))
        .class_initialize("load_template", |ctx| {
            ctx.write_error_line("template lookup failed");
            Err(TestError::unexpected("report template missing"))
        })
        .test("renders_header", |_, _| Ok(()))
        .test("renders_footer", |_, _| Ok(()))
        .build()
}
