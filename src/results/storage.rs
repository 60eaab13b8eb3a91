//! Results storage and retrieval
//!
//! Persists run summaries as JSON files, one directory per assembly.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info};

use crate::models::RunSummary;

/// Stored run of one assembly
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    /// Unique run ID
    pub id: String,

    /// Assembly that was run
    pub assembly: String,

    /// Timestamp when the run started
    pub started_at: DateTime<Utc>,

    /// Timestamp when the run completed
    pub completed_at: DateTime<Utc>,

    /// Environment info
    pub environment: EnvironmentInfo,

    pub summary: RunSummary,
}

/// Environment information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredRun {
    pub fn new(started_at: DateTime<Utc>, summary: RunSummary) -> Self {
        Self {
            id: generate_run_id(started_at),
            assembly: summary.assembly.clone(),
            started_at,
            completed_at: Utc::now(),
            environment: EnvironmentInfo::default(),
            summary,
        }
    }
}

/// Brief run information
#[derive(Clone, Debug)]
pub struct RunInfo {
    pub id: String,
    pub assembly: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub pass_rate: f64,
}

static RUN_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Timestamp plus a per-process sequence number
fn generate_run_id(started_at: DateTime<Utc>) -> String {
    let timestamp = started_at.format("%Y%m%d_%H%M%S");
    let sequence = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10000;
    format!("{timestamp}_{sequence:04}")
}

/// Results storage manager
pub struct ResultsStorage {
    base_dir: PathBuf,
}

impl ResultsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Storage under the user's data directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("test-engine")
            .join("results");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn assembly_dir(&self, assembly: &str) -> PathBuf {
        self.base_dir.join(assembly.to_lowercase())
    }

    fn run_path(&self, assembly: &str, run_id: &str) -> PathBuf {
        self.assembly_dir(assembly).join(format!("{run_id}.json"))
    }

    /// Save a run
    pub fn save(&self, run: &StoredRun) -> Result<PathBuf> {
        let assembly_dir = self.assembly_dir(&run.assembly);
        fs::create_dir_all(&assembly_dir)?;

        let path = self.run_path(&run.assembly, &run.id);
        let file = File::create(&path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, run).context("Failed to write results")?;

        info!("Saved test results to {}", path.display());
        Ok(path)
    }

    /// Load a run by id
    pub fn load(&self, assembly: &str, run_id: &str) -> Result<StoredRun> {
        let path = self.run_path(assembly, run_id);
        let run = self.load_from_path(&path)?;
        debug!("Loaded test results from {}", path.display());
        Ok(run)
    }

    pub fn load_from_path(&self, path: &Path) -> Result<StoredRun> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open results file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context("Failed to parse results")
    }

    /// All runs of an assembly, newest first
    pub fn load_assembly(&self, assembly: &str) -> Result<Vec<StoredRun>> {
        let assembly_dir = self.assembly_dir(assembly);
        if !assembly_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&assembly_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match self.load_from_path(&path) {
                    Ok(run) => runs.push(run),
                    Err(e) => debug!("Failed to load {}: {}", path.display(), e),
                }
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(runs)
    }

    /// Assemblies that have stored results
    pub fn list_assemblies(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut assemblies = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    assemblies.push(name.to_string());
                }
            }
        }

        assemblies.sort();
        Ok(assemblies)
    }

    pub fn list_runs(&self, assembly: &str) -> Result<Vec<RunInfo>> {
        Ok(self
            .load_assembly(assembly)?
            .into_iter()
            .map(|run| RunInfo {
                pass_rate: run.summary.pass_rate(),
                total: run.summary.total,
                id: run.id,
                assembly: run.assembly,
                started_at: run.started_at,
            })
            .collect())
    }

    pub fn latest(&self, assembly: &str) -> Result<Option<StoredRun>> {
        Ok(self.load_assembly(assembly)?.into_iter().next())
    }

    pub fn delete(&self, assembly: &str, run_id: &str) -> Result<()> {
        let path = self.run_path(assembly, run_id);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Deleted results: {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TestResult, UnitTestOutcome};
    use tempfile::tempdir;

    fn summary() -> RunSummary {
        RunSummary::new(
            "Billing",
            vec![
                TestResult::new("Invoices.totals", UnitTestOutcome::Passed),
                TestResult::new("Invoices.rounding", UnitTestOutcome::Failed).with_message("off by one"),
            ],
        )
    }

    #[test]
    fn test_generate_run_id_is_unique() {
        let now = Utc::now();
        assert_ne!(generate_run_id(now), generate_run_id(now));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());

        let run = StoredRun::new(Utc::now(), summary());
        let path = storage.save(&run).unwrap();
        assert!(path.starts_with(dir.path().join("billing")));

        let loaded = storage.load("Billing", &run.id).unwrap();
        assert_eq!(loaded.summary.total, 2);
        assert_eq!(loaded.summary.failed, 1);
        assert_eq!(
            loaded.summary.results[1].error_message.as_deref(),
            Some("off by one")
        );
    }

    #[test]
    fn test_list_runs_and_latest() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());

        let older = StoredRun::new(Utc::now() - chrono::Duration::minutes(5), summary());
        let newer = StoredRun::new(Utc::now(), summary());
        storage.save(&older).unwrap();
        storage.save(&newer).unwrap();

        assert_eq!(storage.list_assemblies().unwrap(), vec!["billing"]);
        let runs = storage.list_runs("Billing").unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, newer.id);
        assert!((runs[0].pass_rate - 50.0).abs() < f64::EPSILON);

        assert_eq!(storage.latest("Billing").unwrap().unwrap().id, newer.id);

        storage.delete("Billing", &older.id).unwrap();
        assert_eq!(storage.list_runs("Billing").unwrap().len(), 1);
    }

    #[test]
    fn test_missing_assembly_is_empty() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path().join("nothing"));
        assert!(storage.list_assemblies().unwrap().is_empty());
        assert!(storage.list_runs("Billing").unwrap().is_empty());
    }
}
