//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "TEST_ENGINE";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Config file from TEST_ENGINE_CONFIG
    pub config_file: Option<String>,
    /// Default test timeout from TEST_ENGINE_TIMEOUT_MS
    pub timeout_ms: Option<u64>,
    /// Parallel from TEST_ENGINE_PARALLEL
    pub parallel: Option<bool>,
    /// Workers from TEST_ENGINE_WORKERS
    pub workers: Option<usize>,
    /// Output format from TEST_ENGINE_FORMAT
    pub format: Option<String>,
    /// Results directory from TEST_ENGINE_RESULTS_DIR
    pub results_dir: Option<String>,
    /// Class cleanup behavior from TEST_ENGINE_CLASS_CLEANUP
    pub cleanup_behavior: Option<String>,
    /// From TEST_ENGINE_CLEANUP_WARNINGS_AS_ERRORS
    pub cleanup_warnings_as_errors: Option<bool>,
    /// Verbose from TEST_ENGINE_VERBOSE
    pub verbose: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            config_file: get_env("CONFIG"),
            timeout_ms: get_env_parse("TIMEOUT_MS"),
            parallel: get_env_bool("PARALLEL"),
            workers: get_env_parse("WORKERS"),
            format: get_env("FORMAT"),
            results_dir: get_env("RESULTS_DIR"),
            cleanup_behavior: get_env("CLASS_CLEANUP"),
            cleanup_warnings_as_errors: get_env_bool("CLEANUP_WARNINGS_AS_ERRORS"),
            verbose: get_env_bool("VERBOSE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.config_file.is_some()
            || self.timeout_ms.is_some()
            || self.parallel.is_some()
            || self.workers.is_some()
            || self.format.is_some()
            || self.results_dir.is_some()
            || self.cleanup_behavior.is_some()
            || self.cleanup_warnings_as_errors.is_some()
            || self.verbose.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_CONFIG:        {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_TIMEOUT_MS:    {:?}", ENV_PREFIX, self.timeout_ms);
        println!("  {}_PARALLEL:      {:?}", ENV_PREFIX, self.parallel);
        println!("  {}_WORKERS:       {:?}", ENV_PREFIX, self.workers);
        println!("  {}_FORMAT:        {:?}", ENV_PREFIX, self.format);
        println!("  {}_RESULTS_DIR:   {:?}", ENV_PREFIX, self.results_dir);
        println!("  {}_CLASS_CLEANUP: {:?}", ENV_PREFIX, self.cleanup_behavior);
        println!("  {}_VERBOSE:       {:?}", ENV_PREFIX, self.verbose);
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    pub fn config_file(self, path: impl Into<String>) -> Self {
        self.var("CONFIG", path)
    }

    pub fn timeout_ms(self, timeout: u64) -> Self {
        self.var("TIMEOUT_MS", timeout.to_string())
    }

    pub fn parallel(self, parallel: bool) -> Self {
        self.var("PARALLEL", parallel.to_string())
    }

    pub fn workers(self, workers: usize) -> Self {
        self.var("WORKERS", workers.to_string())
    }

    pub fn format(self, format: impl Into<String>) -> Self {
        self.var("FORMAT", format)
    }

    pub fn cleanup_behavior(self, behavior: impl Into<String>) -> Self {
        self.var("CLASS_CLEANUP", behavior)
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all TEST_ENGINE environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_CONFIG                      Path to configuration file");
    println!("  {ENV_PREFIX}_TIMEOUT_MS                  Default test timeout in milliseconds");
    println!("  {ENV_PREFIX}_PARALLEL                    Run classes in parallel (true/false)");
    println!("  {ENV_PREFIX}_WORKERS                     Maximum concurrent classes");
    println!("  {ENV_PREFIX}_FORMAT                      Output format (table, json, csv, summary)");
    println!("  {ENV_PREFIX}_RESULTS_DIR                 Directory for stored runs");
    println!("  {ENV_PREFIX}_CLASS_CLEANUP               end-of-class or end-of-assembly");
    println!("  {ENV_PREFIX}_CLEANUP_WARNINGS_AS_ERRORS  Fail results on cleanup errors");
    println!("  {ENV_PREFIX}_VERBOSE                     Enable verbose output (true/false)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_TIMEOUT_MS=5000");
    println!("  test-engine run --parallel");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.timeout_ms.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_builder() {
        let _guard = EnvBuilder::new()
            .timeout_ms(2500)
            .workers(3)
            .cleanup_behavior("end-of-class")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.timeout_ms, Some(2500));
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.cleanup_behavior.as_deref(), Some("end-of-class"));
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = EnvBuilder::new().parallel(true).apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.parallel, Some(true));
    }

    #[test]
    fn test_guard_restores() {
        {
            let _guard = EnvBuilder::new().format("csv").apply_scoped();
            assert_eq!(get_env("FORMAT").as_deref(), Some("csv"));
        }
        assert_eq!(get_env("FORMAT"), None);
    }
}
