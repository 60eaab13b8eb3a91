//! Output formatters for test results
//!
//! Provides table, JSON, CSV and summary output formats.

use std::io::Write;
use std::path::Path;

use crate::models::{RunSummary, TestResult, UnitTestOutcome};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

const CSV_HEADER: [&str; 7] = [
    "test_name",
    "display_name",
    "row_index",
    "outcome",
    "attempt",
    "duration_ms",
    "message",
];

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
    show_output: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
            show_output: false,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Include captured stdout/stderr/trace under each table row
    pub fn with_output(mut self, show_output: bool) -> Self {
        self.show_output = show_output;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a single test result
    pub fn format_result(&self, result: &TestResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_result_table(result),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Csv => csv_rows(std::slice::from_ref(result), false),
            OutputFormat::Summary => result.to_string(),
        }
    }

    fn outcome_label(&self, outcome: UnitTestOutcome) -> String {
        let plain = format!("{} {}", outcome.symbol(), outcome);
        if !self.colorize {
            return plain;
        }
        let color = match outcome {
            UnitTestOutcome::Passed => "32",
            UnitTestOutcome::Ignored | UnitTestOutcome::Inconclusive => "33",
            _ => "31",
        };
        format!("\x1b[{color}m{plain}\x1b[0m")
    }

    fn format_result_table(&self, result: &TestResult) -> String {
        let mut line = format!(
            "{:50} {} [{:>6}ms]",
            result.display_name,
            self.outcome_label(result.outcome),
            result.duration_ms
        );
        if result.attempt > 0 {
            line.push_str(&format!(" (retry {})", result.attempt));
        }
        if let Some(message) = &result.error_message {
            line.push_str(&format!("\n      {message}"));
        }
        if self.show_output {
            for (label, text) in [
                ("stdout", &result.stdout),
                ("stderr", &result.stderr),
                ("trace", &result.trace),
            ] {
                if text.is_empty() {
                    continue;
                }
                line.push_str(&format!("\n      [{label}]"));
                for captured in text.lines() {
                    line.push_str(&format!("\n        {captured}"));
                }
            }
        }
        line
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Csv => csv_rows(&summary.results, true),
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!("║  Assembly {:50} ║\n", summary.assembly));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        for result in &summary.results {
            output.push_str(&format!("  {}\n", self.format_result_table(result)));
        }

        output.push_str("════════════════════════════════════════════════════════════════\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", summary.passed)
        } else {
            summary.passed.to_string()
        };
        let fail_str = if self.colorize && summary.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.failed)
        } else {
            summary.failed.to_string()
        };

        output.push_str(&format!(
            "  Total: {} | Pass: {} | Fail: {} | Timeout: {} | Inconclusive: {} | Ignored: {} | Error: {}\n",
            summary.total,
            pass_str,
            fail_str,
            summary.timeouts,
            summary.inconclusive,
            summary.ignored,
            summary.errors
        ));
        output.push_str(&format!(
            "  Pass Rate: {:5.1}% | Duration: {}ms\n",
            summary.pass_rate(),
            summary.total_duration_ms
        ));

        output
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "{}: {}/{} passed ({:.1}%) in {}ms",
            summary.assembly,
            summary.passed,
            summary.total,
            summary.pass_rate(),
            summary.total_duration_ms
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn csv_rows(results: &[TestResult], header: bool) -> String {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    let mut write = || -> csv::Result<()> {
        if header {
            writer.write_record(CSV_HEADER)?;
        }
        for result in results {
            writer.write_record([
                result.test_name.clone(),
                result.display_name.clone(),
                result.row_index.to_string(),
                result.outcome.to_string(),
                result.attempt.to_string(),
                result.duration_ms.to_string(),
                result.error_message.clone().unwrap_or_default(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    };

    if write().is_err() {
        return String::new();
    }
    writer
        .into_inner()
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_default()
}

/// Write a run summary to a file
pub fn write_results_to_file(
    path: impl AsRef<Path>,
    summary: &RunSummary,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_summary(summary);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
