//! Typed construction of test class descriptors
//!
//! Test code is written against a concrete instance type `T`; the builder
//! erases it into the `Instance`-based descriptors the engine consumes.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{
    ClassCleanupBehavior, ClassLevel, DataRow, FixtureMethod, Instance, InstanceFactory,
    InstanceFixture, InstanceFn, TestClassInfo, TestContext, TestError, TestMethodInfo,
};
use crate::retry::RetryPolicy;

fn erase<T, F>(body: F) -> InstanceFn
where
    T: Send + Sync + 'static,
    F: Fn(&T, &TestContext) -> Result<(), TestError> + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance, ctx: &TestContext| {
        let typed = (**instance).downcast_ref::<T>().ok_or_else(|| {
            TestError::unexpected(format!(
                "Test instance is not a {}",
                std::any::type_name::<T>()
            ))
        })?;
        body(typed, ctx)
    })
}

fn instance_fixture<T, F>(declaring_type: &str, name: &str, body: F) -> InstanceFixture
where
    T: Send + Sync + 'static,
    F: Fn(&T, &TestContext) -> Result<(), TestError> + Send + Sync + 'static,
{
    InstanceFixture {
        declaring_type: declaring_type.to_string(),
        name: name.to_string(),
        timeout: None,
        body: erase(body),
    }
}

/// One base level of a class hierarchy
pub struct LevelBuilder<T> {
    level: ClassLevel,
    _instance: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> LevelBuilder<T> {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            level: ClassLevel {
                type_name: type_name.into(),
                ..Default::default()
            },
            _instance: PhantomData,
        }
    }

    pub fn test_initialize<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&T, &TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.level.test_initialize = Some(instance_fixture(&self.level.type_name, name, body));
        self
    }

    pub fn test_cleanup<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&T, &TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.level.test_cleanup = Some(instance_fixture(&self.level.type_name, name, body));
        self
    }

    pub fn cleanup_behavior(mut self, behavior: ClassCleanupBehavior) -> Self {
        self.level.cleanup_behavior = Some(behavior);
        self
    }
}

/// A test method of a class with instance type `T`
pub struct TestMethodBuilder<T> {
    name: String,
    ignored: bool,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    data_rows: Option<Vec<DataRow>>,
    body: Option<InstanceFn>,
    _instance: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TestMethodBuilder<T> {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&T, &TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        Self {
            body: Some(erase(body)),
            ..Self::without_body(name)
        }
    }

    /// A method that was discovered but cannot be executed
    pub fn without_body(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ignored: false,
            timeout: None,
            retry: None,
            data_rows: None,
            body: None,
            _instance: PhantomData,
        }
    }

    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn data_row(mut self, row: DataRow) -> Self {
        self.data_rows.get_or_insert_with(Vec::new).push(row);
        self
    }

    /// Mark data-driven with exactly these rows (possibly none)
    pub fn data_rows(mut self, rows: Vec<DataRow>) -> Self {
        self.data_rows = Some(rows);
        self
    }

    fn build(self, class_name: &str) -> TestMethodInfo {
        TestMethodInfo {
            class_name: class_name.to_string(),
            name: self.name,
            ignored: self.ignored,
            timeout: self.timeout,
            retry: self.retry,
            data_rows: self.data_rows,
            body: self.body,
        }
    }
}

/// Builds a [`TestClassInfo`] whose instances are `T`
pub struct TestClassBuilder<T> {
    name: String,
    bases: Vec<ClassLevel>,
    own: ClassLevel,
    factory: InstanceFactory,
    disposer: Option<InstanceFn>,
    class_initialize: Option<FixtureMethod>,
    class_cleanup: Option<FixtureMethod>,
    methods: Vec<TestMethodBuilder<T>>,
}

impl<T: Send + Sync + 'static> TestClassBuilder<T> {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&TestContext) -> Result<T, TestError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            own: ClassLevel {
                type_name: name.clone(),
                ..Default::default()
            },
            name,
            bases: Vec::new(),
            factory: Arc::new(move |ctx: &TestContext| {
                factory(ctx).map(|instance| Arc::new(instance) as Instance)
            }),
            disposer: None,
            class_initialize: None,
            class_cleanup: None,
            methods: Vec::new(),
        }
    }

    /// Add a base level; call from the root of the hierarchy downwards
    pub fn base(mut self, level: LevelBuilder<T>) -> Self {
        self.bases.push(level.level);
        self
    }

    pub fn test_initialize<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&T, &TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.own.test_initialize = Some(instance_fixture(&self.name, name, body));
        self
    }

    pub fn test_cleanup<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&T, &TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.own.test_cleanup = Some(instance_fixture(&self.name, name, body));
        self
    }

    pub fn cleanup_behavior(mut self, behavior: ClassCleanupBehavior) -> Self {
        self.own.cleanup_behavior = Some(behavior);
        self
    }

    /// Runs after test cleanup for every instance, even when cleanup failed
    pub fn disposer<F>(mut self, body: F) -> Self
    where
        F: Fn(&T, &TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.disposer = Some(erase(body));
        self
    }

    pub fn class_initialize<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.class_initialize = Some(FixtureMethod::new(self.name.clone(), name, body));
        self
    }

    pub fn class_cleanup<F>(mut self, name: &str, body: F) -> Self
    where
        F: Fn(&TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.class_cleanup = Some(FixtureMethod::new(self.name.clone(), name, body));
        self
    }

    pub fn test<F>(self, name: &str, body: F) -> Self
    where
        F: Fn(&T, &TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        self.method(TestMethodBuilder::new(name, body))
    }

    pub fn method(mut self, method: TestMethodBuilder<T>) -> Self {
        self.methods.push(method);
        self
    }

    pub fn build(self) -> TestClassInfo {
        let mut hierarchy = self.bases;
        hierarchy.push(self.own);

        let name = self.name;
        let methods = self
            .methods
            .into_iter()
            .map(|m| m.build(&name))
            .collect();

        TestClassInfo {
            name,
            hierarchy,
            factory: self.factory,
            disposer: self.disposer,
            class_initialize: self.class_initialize,
            class_cleanup: self.class_cleanup,
            methods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter {
        hits: AtomicUsize,
    }

    fn counter_class() -> TestClassInfo {
        TestClassBuilder::new("CounterTests", |_| {
            Ok(Counter {
                hits: AtomicUsize::new(0),
            })
        })
        .base(LevelBuilder::new("Root").test_initialize("root_init", |c: &Counter, _| {
            c.hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .test_cleanup("cleanup", |_, _| Ok(()))
        .test("counts", |c, _| {
            c.hits.fetch_add(10, Ordering::SeqCst);
            Ok(())
        })
        .method(
            TestMethodBuilder::new("rows", |_, ctx| {
                ctx.write_line(format!("{:?}", ctx.arg(0)));
                Ok(())
            })
            .data_row(DataRow::new(vec![json!(1)]))
            .data_row(DataRow::new(vec![json!(2)])),
        )
        .method(TestMethodBuilder::without_body("broken"))
        .build()
    }

    #[test]
    fn test_hierarchy_is_base_first() {
        let class = counter_class();
        let names: Vec<&str> = class.hierarchy.iter().map(|l| l.type_name.as_str()).collect();
        assert_eq!(names, vec!["Root", "CounterTests"]);
        assert!(class.hierarchy[0].test_initialize.is_some());
        assert!(class.hierarchy[1].test_cleanup.is_some());
    }

    #[test]
    fn test_methods_carry_class_name() {
        let class = counter_class();
        assert_eq!(class.methods.len(), 3);
        assert_eq!(class.methods[0].full_name(), "CounterTests.counts");
        assert_eq!(class.methods[1].data_rows.as_ref().map(Vec::len), Some(2));
        assert!(class.methods[2].body.is_none());
    }

    #[test]
    fn test_erased_bodies_see_typed_instance() {
        let class = counter_class();
        let ctx = TestContext::new("CounterTests", "counts");
        let instance = (class.factory)(&ctx).unwrap();

        let init = class.hierarchy[0].test_initialize.as_ref().unwrap();
        (init.body)(&instance, &ctx).unwrap();
        (class.methods[0].body.as_ref().unwrap())(&instance, &ctx).unwrap();

        let counter = instance.downcast_ref::<Counter>().unwrap();
        assert_eq!(counter.hits.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_wrong_instance_type_is_an_error() {
        let class = counter_class();
        let ctx = TestContext::new("CounterTests", "counts");
        let foreign: Instance = Arc::new("not a counter");

        let err = (class.methods[0].body.as_ref().unwrap())(&foreign, &ctx).unwrap_err();
        assert!(matches!(err, TestError::Unexpected(_)));
    }
}
