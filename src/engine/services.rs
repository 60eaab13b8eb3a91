//! Shared collaborators of one engine instance

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::capture::OutputCapture;
use crate::config::EngineConfig;
use crate::executor::BoundedRunner;
use crate::metadata::{AttributeResolver, DeclaredAttributes};
use crate::models::TestContext;
use crate::utils::{MessageSink, TracingSink};

/// Everything the fixture coordinator and the runners need
#[derive(Clone)]
pub struct EngineServices {
    pub runner: BoundedRunner,
    pub resolver: Arc<dyn AttributeResolver>,
    pub sink: Arc<dyn MessageSink>,
    pub config: Arc<EngineConfig>,
    properties: Arc<BTreeMap<String, Value>>,
}

impl EngineServices {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            runner: BoundedRunner::new(),
            resolver: Arc::new(DeclaredAttributes::new(&config)),
            sink: Arc::new(TracingSink),
            properties: Arc::new(config.properties.clone()),
            config: Arc::new(config),
        }
    }

    pub fn with_runner(mut self, runner: BoundedRunner) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn AttributeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Fresh context with its own capture, for one fixture or test invocation
    pub fn context(&self, class_name: &str, name: &str) -> TestContext {
        TestContext::new(class_name, name)
            .with_capture(OutputCapture::new())
            .with_properties(self.properties.clone())
    }
}

impl Default for EngineServices {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
