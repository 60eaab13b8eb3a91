//! Resolved test descriptors
//!
//! Plain values describing an assembly, its classes and their test methods
//! after metadata resolution. The engine only reads these.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::context::TestContext;
use super::error::TestError;
use crate::retry::RetryPolicy;

/// Type-erased test class instance
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Assembly or class level fixture body
pub type StaticFn = Arc<dyn Fn(&TestContext) -> Result<(), TestError> + Send + Sync>;

/// Test method, test initialize/cleanup or disposer body
pub type InstanceFn = Arc<dyn Fn(&Instance, &TestContext) -> Result<(), TestError> + Send + Sync>;

/// Creates a fresh instance for each test invocation
pub type InstanceFactory = Arc<dyn Fn(&TestContext) -> Result<Instance, TestError> + Send + Sync>;

/// When class cleanup runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassCleanupBehavior {
    /// Right after the last test of the class
    EndOfClass,
    /// After every class of the assembly has finished
    #[default]
    EndOfAssembly,
}

impl ClassCleanupBehavior {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "end-of-class" | "class" => Some(ClassCleanupBehavior::EndOfClass),
            "end-of-assembly" | "assembly" => Some(ClassCleanupBehavior::EndOfAssembly),
            _ => None,
        }
    }
}

/// Assembly or class level fixture method
#[derive(Clone)]
pub struct FixtureMethod {
    pub declaring_type: String,
    pub name: String,
    pub timeout: Option<Duration>,
    pub body: StaticFn,
}

impl FixtureMethod {
    pub fn new<F>(declaring_type: impl Into<String>, name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&TestContext) -> Result<(), TestError> + Send + Sync + 'static,
    {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            timeout: None,
            body: Arc::new(body),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for FixtureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

/// Test initialize or test cleanup method declared on one hierarchy level
#[derive(Clone)]
pub struct InstanceFixture {
    pub declaring_type: String,
    pub name: String,
    pub timeout: Option<Duration>,
    pub body: InstanceFn,
}

impl fmt::Debug for InstanceFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type, self.name)
    }
}

/// One level of a test class hierarchy
#[derive(Clone, Debug, Default)]
pub struct ClassLevel {
    pub type_name: String,
    pub test_initialize: Option<InstanceFixture>,
    pub test_cleanup: Option<InstanceFixture>,
    pub cleanup_behavior: Option<ClassCleanupBehavior>,
}

/// One set of arguments for a data-driven test
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    pub values: Vec<Value>,
    pub display_name: Option<String>,
}

impl DataRow {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            display_name: None,
        }
    }

    pub fn named(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Display name for the invocation of `method` with this row
    pub fn display_for(&self, method: &str) -> String {
        if let Some(name) = &self.display_name {
            return name.clone();
        }
        let args: Vec<String> = self
            .values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        format!("{} ({})", method, args.join(", "))
    }
}

/// A resolved test method
#[derive(Clone)]
pub struct TestMethodInfo {
    pub class_name: String,
    pub name: String,
    pub ignored: bool,
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    pub data_rows: Option<Vec<DataRow>>,
    /// `None` marks a method that cannot be executed
    pub body: Option<InstanceFn>,
}

impl TestMethodInfo {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.class_name, self.name)
    }
}

impl fmt::Debug for TestMethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestMethodInfo")
            .field("name", &self.full_name())
            .field("ignored", &self.ignored)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("data_rows", &self.data_rows.as_ref().map(|r| r.len()))
            .finish()
    }
}

/// A resolved test class
#[derive(Clone)]
pub struct TestClassInfo {
    pub name: String,
    /// Ordered base → derived; the last level is the class itself
    pub hierarchy: Vec<ClassLevel>,
    pub factory: InstanceFactory,
    pub disposer: Option<InstanceFn>,
    pub class_initialize: Option<FixtureMethod>,
    pub class_cleanup: Option<FixtureMethod>,
    pub methods: Vec<TestMethodInfo>,
}

impl fmt::Debug for TestClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestClassInfo")
            .field("name", &self.name)
            .field("levels", &self.hierarchy.len())
            .field("class_initialize", &self.class_initialize)
            .field("class_cleanup", &self.class_cleanup)
            .field("methods", &self.methods)
            .finish()
    }
}

/// A resolved test assembly
#[derive(Clone, Debug)]
pub struct AssemblyInfo {
    pub name: String,
    pub initialize: Option<FixtureMethod>,
    pub cleanup: Option<FixtureMethod>,
    pub classes: Vec<Arc<TestClassInfo>>,
}

impl AssemblyInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initialize: None,
            cleanup: None,
            classes: Vec::new(),
        }
    }

    pub fn with_initialize(mut self, fixture: FixtureMethod) -> Self {
        self.initialize = Some(fixture);
        self
    }

    pub fn with_cleanup(mut self, fixture: FixtureMethod) -> Self {
        self.cleanup = Some(fixture);
        self
    }

    pub fn with_class(mut self, class: TestClassInfo) -> Self {
        self.classes.push(Arc::new(class));
        self
    }

    pub fn test_count(&self) -> usize {
        self.classes.iter().map(|c| c.methods.len()).sum()
    }
}
