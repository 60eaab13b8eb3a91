//! test-engine - Unit-Test Execution Engine
//!
//! A CLI around the execution engine: runs the built-in sample assembly,
//! lists its tests, and manages stored results and configuration.
//!
//! ## Usage
//!
//! ```bash
//! # Run every sample test
//! test-engine run
//!
//! # Run one class in parallel mode with a default timeout, and store the run
//! test-engine run --class Calculator --parallel --timeout 500 --save
//!
//! # List the sample tests
//! test-engine list --detailed
//!
//! # Inspect stored runs
//! test-engine results list
//! test-engine results show Samples --format json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod cli;

use cli::Args;
use test_engine::config::{print_env_help, ConfigFile, EngineConfig, EnvConfig};
use test_engine::engine::{EngineServices, TestExecutionManager};
use test_engine::output::{write_results_to_file, OutputFormat, ResultFormatter};
use test_engine::results::{ResultsStorage, StoredRun};
use test_engine::samples::sample_assembly;
use test_engine::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let level = if args.verbose || env.verbose.unwrap_or(false) {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    init_logger(level);

    match args.command {
        cli::Command::Run(run_args) => {
            let config = load_config(args.config.as_deref(), &env)?;
            let all_passed = run_tests(run_args, config).await?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        cli::Command::List(list_args) => {
            list_tests(list_args);
        }
        cli::Command::Results(results_args) => {
            let config = load_config(args.config.as_deref(), &env)?;
            show_results(results_args, &config)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, args.config.as_deref(), &env)?;
        }
    }

    Ok(())
}

/// File configuration (explicit path, `TEST_ENGINE_CONFIG` or the standard
/// locations) with environment overrides applied
fn load_config(path: Option<&str>, env: &EnvConfig) -> Result<EngineConfig> {
    let file = match path.or(env.config_file.as_deref()) {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };

    let mut engine = file.engine;
    engine
        .apply_env(env)
        .context("Invalid environment override")?;
    Ok(engine)
}

fn storage_for(results_dir: Option<PathBuf>) -> ResultsStorage {
    match results_dir {
        Some(dir) => ResultsStorage::new(dir),
        None => ResultsStorage::default_dir(),
    }
}

async fn run_tests(args: cli::RunArgs, mut config: EngineConfig) -> Result<bool> {
    if args.parallel {
        config.parallel.enabled = true;
    }
    if let Some(workers) = args.workers {
        config.parallel.workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.default_test_timeout_ms = timeout;
    }
    if let Some(format) = args.format {
        config.format = format;
    }
    config.validate()?;
    let format = config.output_format()?;

    let mut assembly = sample_assembly();
    if let Some(filter) = &args.class {
        let filter = filter.to_lowercase();
        assembly
            .classes
            .retain(|class| class.name.to_lowercase().contains(&filter));
        if assembly.classes.is_empty() {
            anyhow::bail!("No class matches: {filter}");
        }
    }

    info!(
        "Running {} ({} classes, {} tests)",
        assembly.name,
        assembly.classes.len(),
        assembly.test_count()
    );

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    let results_dir = config.results_dir.clone();
    let manager = TestExecutionManager::new(EngineServices::new(config));
    let report = manager.run_assembly(Arc::new(assembly), cancel).await;

    let formatter = ResultFormatter::new(format).with_output(args.show_output);
    println!("{}", formatter.format_summary(&report.summary));

    if let Some(path) = &args.output {
        write_results_to_file(path, &report.summary, format)
            .with_context(|| format!("Failed to write results to {path}"))?;
        println!("✓ Results written to: {path}");
    }

    if args.save {
        let storage = storage_for(results_dir);
        let run = StoredRun::new(report.started_at, report.summary.clone());
        let path = storage.save(&run)?;
        println!("✓ Run {} saved to: {}", run.id, path.display());
    }

    Ok(report.summary.is_all_passed())
}

fn list_tests(args: cli::ListArgs) {
    let assembly = sample_assembly();

    println!(
        "\nAssembly {} ({} tests)\n",
        assembly.name,
        assembly.test_count()
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for class in &assembly.classes {
        println!("\n{}:", class.name);
        println!("──────────────────────────────────────────────────────────────────────");

        for method in &class.methods {
            if !args.detailed {
                println!("  {}", method.name);
                continue;
            }

            let mut notes = Vec::new();
            if method.ignored {
                notes.push("ignored".to_string());
            }
            if method.body.is_none() {
                notes.push("not runnable".to_string());
            }
            if let Some(timeout) = method.timeout {
                notes.push(format!("timeout {}ms", timeout.as_millis()));
            }
            if let Some(policy) = &method.retry {
                notes.push(format!(
                    "retry x{} ({:?}, {}ms)",
                    policy.max_retry_attempts(),
                    policy.backoff(),
                    policy.delay().as_millis()
                ));
            }
            if let Some(rows) = &method.data_rows {
                notes.push(format!("{} data rows", rows.len()));
            }
            println!("  {:28} {}", method.name, notes.join(", "));
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
}

fn show_results(args: cli::ResultsArgs, config: &EngineConfig) -> Result<()> {
    let storage = storage_for(config.results_dir.clone());

    match args.action {
        cli::ResultsAction::List { assembly } => {
            let assemblies = match assembly {
                Some(assembly) => vec![assembly],
                None => storage.list_assemblies()?,
            };

            if assemblies.is_empty() {
                println!("\n📭 No stored results found.");
                println!("   Run tests with: test-engine run --save");
                return Ok(());
            }

            println!("\n┌──────────────────────┬──────────────────────┬───────┬─────────┐");
            println!("│ Assembly             │ Run ID               │ Tests │ Pass    │");
            println!("├──────────────────────┼──────────────────────┼───────┼─────────┤");
            for assembly in &assemblies {
                for run in storage.list_runs(assembly)? {
                    println!(
                        "│ {:20} │ {:20} │ {:>5} │ {:>6.1}% │",
                        run.assembly, run.id, run.total, run.pass_rate
                    );
                }
            }
            println!("└──────────────────────┴──────────────────────┴───────┴─────────┘\n");
        }

        cli::ResultsAction::Show {
            assembly,
            id,
            format,
        } => {
            let run = match id {
                Some(id) => storage.load(&assembly, &id)?,
                None => storage
                    .latest(&assembly)?
                    .with_context(|| format!("No results found for assembly: {assembly}"))?,
            };

            let format = OutputFormat::from_str(&format).unwrap_or(OutputFormat::Table);
            if format == OutputFormat::Table {
                println!(
                    "\nRun {} ({} {}, engine {})",
                    run.id, run.environment.os, run.environment.arch, run.environment.tool_version
                );
                println!(
                    "Started {} | Completed {}\n",
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.completed_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            println!("{}", ResultFormatter::new(format).format_summary(&run.summary));
        }

        cli::ResultsAction::Delete { assembly, id } => {
            storage.delete(&assembly, &id)?;
            println!("✓ Deleted run {id} of {assembly}");
        }
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, path: Option<&str>, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show {
            env: show_env,
            format,
        } => {
            if show_env {
                env.print_summary();
            } else {
                let mut config = match path {
                    Some(path) => ConfigFile::load(path)?,
                    None => ConfigFile::load_default()?,
                };
                config.engine.apply_env(env)?;

                let output = if format == "json" {
                    serde_json::to_string_pretty(&config)?
                } else {
                    serde_yaml::to_string(&config)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let path = file
                .or_else(|| path.map(str::to_string))
                .or_else(|| ConfigFile::find().map(|p| p.to_string_lossy().to_string()))
                .unwrap_or_else(|| "./test-engine.yaml".to_string());

            match ConfigFile::load(&path) {
                Ok(_) => {
                    println!("✓ Configuration file is valid: {path}");
                }
                Err(e) => {
                    println!("✗ Configuration file is invalid: {path}");
                    println!("  Error: {e}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => {
            print_env_help();
        }
    }

    Ok(())
}
