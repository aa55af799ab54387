//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Status;
use clap::Parser;
use std::path::PathBuf;

/// CellAudit - KPI degradation audit for radio network cells
///
/// Evaluates per-technology threshold rules over the last seven days of a
/// daily KPI export and reports persistently degraded cells.
///
/// Examples:
///   cellaudit --input kpi_2g.csv --tech 2G
///   cellaudit -i kpi_4g.csv -t 4G --format csv -o worst_4g.csv
///   cellaudit -i kpi_3g.csv -t 3G --status critical --fail-on critical
///   cellaudit --add-rule "4G|ERAB_SR|>=|99" --list-rules
///   cellaudit --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// KPI export to analyze (CSV, one row per cell and day)
    #[arg(
        short,
        long,
        value_name = "FILE",
        required_unless_present_any = ["init_config", "init_rules", "list_rules", "add_rule", "replace_rule", "remove_rule"]
    )]
    pub input: Option<PathBuf>,

    /// Technology whose rules are applied (e.g. 2G, 3G, 4G)
    #[arg(short, long, default_value = "2G", value_name = "KEY", env = "CELLAUDIT_TECH")]
    pub tech: String,

    /// Path to the JSON rule file
    ///
    /// Created with the built-in rules if it does not exist.
    #[arg(long, value_name = "FILE", env = "CELLAUDIT_RULES")]
    pub rules: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .cellaudit.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, csv)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Worst cells listed per KPI
    #[arg(long, value_name = "N")]
    pub top: Option<usize>,

    /// Only list this KPI
    #[arg(long, value_name = "NAME")]
    pub kpi: Option<String>,

    /// Only list violations with this status
    #[arg(long, value_name = "STATUS")]
    pub status: Option<StatusFilter>,

    /// Only list cells whose name contains this text (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub cell: Option<String>,

    /// Number of evaluation worker threads
    #[arg(long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Fail if violations at or above this status are found
    ///
    /// Useful for CI pipelines. Exit code 2 when threshold is exceeded.
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Leave the D1..D7 columns out of the Markdown report
    #[arg(long)]
    pub no_slots: bool,

    /// Append a rule: "TECH|KPI|OP|THRESHOLD[|COUNT_COLUMN|COUNT_THRESHOLD]"
    ///
    /// Can be repeated. The rule file is saved afterwards.
    #[arg(long, value_name = "RULE")]
    pub add_rule: Vec<String>,

    /// Replace a rule by position: "TECH:INDEX|KPI|OP|THRESHOLD[|COUNT_COLUMN|COUNT_THRESHOLD]"
    ///
    /// Can be repeated. Applied after --add-rule.
    #[arg(long, value_name = "RULE")]
    pub replace_rule: Vec<String>,

    /// Remove a rule by position: "TECH:INDEX" (zero-based)
    ///
    /// Can be repeated. Applied last.
    #[arg(long, value_name = "TECH:INDEX")]
    pub remove_rule: Vec<String>,

    /// Print the rule store and exit
    #[arg(long)]
    pub list_rules: bool,

    /// Write the built-in rules to the rule file, replacing its content
    #[arg(long)]
    pub init_rules: bool,

    /// Generate a default .cellaudit.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// CSV export of the violation list
    Csv,
}

/// Status level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Warning,
    Critical,
}

impl FailOnLevel {
    /// Returns true if `status` is at or above this level.
    pub fn is_met_by(self, status: Status) -> bool {
        match self {
            FailOnLevel::Warning => true,
            FailOnLevel::Critical => status == Status::Critical,
        }
    }
}

/// Status selector for --status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StatusFilter {
    Warning,
    Critical,
}

impl From<StatusFilter> for Status {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::Warning => Status::Warning,
            StatusFilter::Critical => Status::Critical,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.workers == Some(0) {
            return Err("Workers must be at least 1".to_string());
        }

        if self.top == Some(0) {
            return Err("Top must be at least 1".to_string());
        }

        if self.tech.trim().is_empty() {
            return Err("Technology must not be empty".to_string());
        }

        if let Some(ref input) = self.input {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `general.verbose` from the config file; `--quiet`
    /// still wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
