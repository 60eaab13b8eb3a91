//! Context handed to test code

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use super::test_method::DataRow;
use crate::capture::{Channel, OutputCapture};

/// Per-invocation view of the running test.
///
/// Writes go to the capture of the invocation that owns this context, so a
/// context may be moved to any worker thread without mixing output.
#[derive(Clone, Debug)]
pub struct TestContext {
    class_name: Arc<str>,
    test_name: Arc<str>,
    data_row: Option<(usize, DataRow)>,
    properties: Arc<BTreeMap<String, Value>>,
    capture: OutputCapture,
    cancellation: CancellationToken,
    result_files: Arc<Mutex<Vec<PathBuf>>>,
}

impl TestContext {
    pub fn new(class_name: &str, test_name: &str) -> Self {
        Self {
            class_name: class_name.into(),
            test_name: test_name.into(),
            data_row: None,
            properties: Arc::new(BTreeMap::new()),
            capture: OutputCapture::new(),
            cancellation: CancellationToken::new(),
            result_files: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_capture(mut self, capture: OutputCapture) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_data_row(mut self, index: usize, row: DataRow) -> Self {
        self.data_row = Some((index, row));
        self
    }

    pub fn with_properties(mut self, properties: Arc<BTreeMap<String, Value>>) -> Self {
        self.properties = properties;
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    pub fn fully_qualified_name(&self) -> String {
        format!("{}.{}", self.class_name, self.test_name)
    }

    pub fn data_row(&self) -> Option<&DataRow> {
        self.data_row.as_ref().map(|(_, row)| row)
    }

    pub fn data_row_index(&self) -> Option<usize> {
        self.data_row.as_ref().map(|(index, _)| *index)
    }

    /// Positional data-row argument
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.data_row().and_then(|row| row.values.get(index))
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn write_line(&self, text: impl AsRef<str>) {
        self.capture.write_line(Channel::StdOut, text.as_ref());
    }

    pub fn write_error_line(&self, text: impl AsRef<str>) {
        self.capture.write_line(Channel::StdErr, text.as_ref());
    }

    pub fn trace_line(&self, text: impl AsRef<str>) {
        self.capture.write_line(Channel::Trace, text.as_ref());
    }

    pub fn capture(&self) -> &OutputCapture {
        &self.capture
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Attach an artifact file to the result of this invocation
    pub fn add_result_file(&self, path: impl Into<PathBuf>) {
        self.result_files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(path.into());
    }

    pub fn result_files(&self) -> Vec<PathBuf> {
        self.result_files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
