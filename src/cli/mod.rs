//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Unit-test execution engine
#[derive(Parser, Debug)]
#[command(name = "test-engine")]
#[command(author = "hephaex@gmail.com")]
#[command(version)]
#[command(about = "Run test assemblies with fixtures, timeouts and retries")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the sample assembly
    Run(RunArgs),

    /// List the tests of the sample assembly
    List(ListArgs),

    /// View stored results
    Results(ResultsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Only run classes whose name contains this text
    #[arg(long)]
    pub class: Option<String>,

    /// Run classes in parallel
    #[arg(short, long)]
    pub parallel: bool,

    /// Number of classes run concurrently (when parallel)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Default test timeout in milliseconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Include captured output in the table
    #[arg(long)]
    pub show_output: bool,

    /// Store the run in the results directory
    #[arg(short, long)]
    pub save: bool,

    /// Also write the formatted results to this file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Show timeouts, retries, data rows and ignore flags
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    #[command(subcommand)]
    pub action: ResultsAction,
}

#[derive(Subcommand, Debug)]
pub enum ResultsAction {
    /// List stored runs
    List {
        /// Only runs of this assembly
        #[arg(short, long)]
        assembly: Option<String>,
    },

    /// Show one stored run (the latest when no id is given)
    Show {
        /// Assembly name
        assembly: String,

        /// Run id
        #[arg(short, long)]
        id: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Delete a stored run
    Delete {
        /// Assembly name
        assembly: String,

        /// Run id
        id: String,
    },
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "./test-engine.yaml")]
        output: String,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment overrides instead
        #[arg(short, long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the standard locations)
        file: Option<String>,
    },

    /// Show supported environment variables
    Env,
}
