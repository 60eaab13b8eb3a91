//! Configuration module
//!
//! Engine settings loaded from a YAML/JSON file and overridden by
//! `TEST_ENGINE_*` environment variables.

mod env;
mod file;

pub use env::{print_env_help, EnvBuilder, EnvConfig, EnvGuard};
pub use file::ConfigFile;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::models::ClassCleanupBehavior;
use crate::output::OutputFormat;
use crate::results::Phase;

/// Invalid configuration values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Parallel workers must be at least 1, got {0}")]
    InvalidWorkers(usize),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Unknown class cleanup behavior: {0}")]
    UnknownCleanupBehavior(String),
}

/// Engine configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout applied to test methods that declare none; 0 disables it
    pub default_test_timeout_ms: u64,

    /// Default timeouts per fixture kind
    pub fixture_timeouts: FixtureTimeouts,

    /// Cleanup timing for classes that declare none
    pub class_cleanup_behavior: ClassCleanupBehavior,

    /// Class/assembly cleanup failures also fail the last result
    pub treat_cleanup_warnings_as_errors: bool,

    pub parallel: ParallelConfig,

    /// Where stored runs are written; the user data directory when unset
    pub results_dir: Option<PathBuf>,

    /// Output format name (table, json, json-pretty, csv, summary)
    pub format: String,

    /// Properties exposed to tests through the test context
    pub properties: BTreeMap<String, Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_test_timeout_ms: 0,
            fixture_timeouts: FixtureTimeouts::default(),
            class_cleanup_behavior: ClassCleanupBehavior::default(),
            treat_cleanup_warnings_as_errors: false,
            parallel: ParallelConfig::default(),
            results_dir: None,
            format: "table".to_string(),
            properties: BTreeMap::new(),
        }
    }
}

/// Default fixture timeouts in milliseconds; 0 disables the bound
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureTimeouts {
    pub assembly_initialize_ms: u64,
    pub assembly_cleanup_ms: u64,
    pub class_initialize_ms: u64,
    pub class_cleanup_ms: u64,
    pub test_initialize_ms: u64,
    pub test_cleanup_ms: u64,
}

impl FixtureTimeouts {
    /// Configured default for the fixture running in `phase`
    pub fn for_phase(&self, phase: Phase) -> Option<Duration> {
        let ms = match phase {
            Phase::AssemblyInitialize => self.assembly_initialize_ms,
            Phase::AssemblyCleanup => self.assembly_cleanup_ms,
            Phase::ClassInitialize => self.class_initialize_ms,
            Phase::ClassCleanup => self.class_cleanup_ms,
            Phase::TestInitialize => self.test_initialize_ms,
            Phase::TestCleanup | Phase::Dispose => self.test_cleanup_ms,
            Phase::InstanceCreation | Phase::TestMethod => 0,
        };
        millis(ms)
    }
}

/// Parallel class execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub enabled: bool,
    pub workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            workers: 4,
        }
    }
}

impl EngineConfig {
    pub fn default_test_timeout(&self) -> Option<Duration> {
        millis(self.default_test_timeout_ms)
    }

    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        OutputFormat::from_str(&self.format)
            .ok_or_else(|| ConfigError::UnknownFormat(self.format.clone()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallel.workers == 0 {
            return Err(ConfigError::InvalidWorkers(0));
        }
        self.output_format()?;
        Ok(())
    }

    /// Apply environment overrides on top of file values
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<(), ConfigError> {
        if let Some(timeout) = env.timeout_ms {
            self.default_test_timeout_ms = timeout;
        }
        if let Some(parallel) = env.parallel {
            self.parallel.enabled = parallel;
        }
        if let Some(workers) = env.workers {
            self.parallel.workers = workers;
        }
        if let Some(format) = &env.format {
            self.format = format.clone();
        }
        if let Some(dir) = &env.results_dir {
            self.results_dir = Some(PathBuf::from(dir));
        }
        if let Some(behavior) = &env.cleanup_behavior {
            self.class_cleanup_behavior = ClassCleanupBehavior::from_str(behavior)
                .ok_or_else(|| ConfigError::UnknownCleanupBehavior(behavior.clone()))?;
        }
        if let Some(strict) = env.cleanup_warnings_as_errors {
            self.treat_cleanup_warnings_as_errors = strict;
        }
        self.validate()
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.default_test_timeout(), None);
        assert_eq!(
            config.class_cleanup_behavior,
            ClassCleanupBehavior::EndOfAssembly
        );
        assert!(!config.parallel.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fixture_timeouts_for_phase() {
        let timeouts = FixtureTimeouts {
            class_initialize_ms: 250,
            test_cleanup_ms: 40,
            ..Default::default()
        };
        assert_eq!(
            timeouts.for_phase(Phase::ClassInitialize),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            timeouts.for_phase(Phase::Dispose),
            Some(Duration::from_millis(40))
        );
        assert_eq!(timeouts.for_phase(Phase::AssemblyCleanup), None);
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut config = EngineConfig::default();
        let env = EnvConfig {
            timeout_ms: Some(1500),
            workers: Some(8),
            cleanup_behavior: Some("end-of-class".to_string()),
            ..Default::default()
        };
        config.apply_env(&env).unwrap();

        assert_eq!(
            config.default_test_timeout(),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(config.parallel.workers, 8);
        assert_eq!(config.class_cleanup_behavior, ClassCleanupBehavior::EndOfClass);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = EngineConfig::default();
        let env = EnvConfig {
            format: Some("xml".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.apply_env(&env),
            Err(ConfigError::UnknownFormat("xml".to_string()))
        );

        let mut config = EngineConfig::default();
        config.parallel.workers = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidWorkers(0)));
    }
}
