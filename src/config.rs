//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.cellaudit.toml` files.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".cellaudit.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Input file layout.
    #[serde(default)]
    pub input: InputConfig,

    /// Rule file location.
    #[serde(default)]
    pub rules: RulesConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of evaluation worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            workers: default_workers(),
        }
    }
}

fn default_output() -> String {
    "cellaudit_report.md".to_string()
}

fn default_workers() -> usize {
    4
}

/// Column names and delimiter of the KPI export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Column holding the cell identifier.
    #[serde(default = "default_cell_column")]
    pub cell_column: String,

    /// Column holding the day-first date.
    #[serde(default = "default_date_column")]
    pub date_column: String,

    /// Field delimiter. Must be a single ASCII character.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            cell_column: default_cell_column(),
            date_column: default_date_column(),
            delimiter: default_delimiter(),
        }
    }
}

fn default_cell_column() -> String {
    "Cell Name".to_string()
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

impl InputConfig {
    /// The delimiter as the byte the CSV reader expects.
    ///
    /// Only meaningful after [`Config::validate`] has accepted the value;
    /// falls back to a comma otherwise.
    pub fn delimiter_byte(&self) -> u8 {
        match self.delimiter.as_bytes() {
            [b] => *b,
            _ => b',',
        }
    }
}

/// Rule store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Path of the JSON rule file. Created with the built-in rules if missing.
    #[serde(default = "default_rules_path")]
    pub path: String,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: default_rules_path(),
        }
    }
}

fn default_rules_path() -> String {
    "cellaudit_rules.json".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Worst cells listed per KPI.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Include the seven day-slot columns in the report tables.
    #[serde(default = "default_true")]
    pub include_slots: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            include_slots: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_top_n() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.input.delimiter.len() != 1 {
            bail!(
                "input.delimiter must be a single ASCII character, got '{}'",
                self.input.delimiter
            );
        }
        if self.general.workers == 0 {
            bail!("general.workers must be at least 1");
        }
        if self.report.top_n == 0 {
            bail!("report.top_n must be at least 1");
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(workers) = args.workers {
            self.general.workers = workers;
        }
        if let Some(ref rules) = args.rules {
            self.rules.path = rules.display().to_string();
        }
        if let Some(top) = args.top {
            self.report.top_n = top;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
        if args.no_slots {
            self.report.include_slots = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.workers, 4);
        assert_eq!(config.input.cell_column, "Cell Name");
        assert_eq!(config.input.delimiter_byte(), b',');
        assert_eq!(config.rules.path, "cellaudit_rules.json");
        assert_eq!(config.report.top_n, 5);
        assert!(config.report.include_slots);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
verbose = true

[input]
cell_column = "CELL"
delimiter = ";"

[report]
top_n = 10
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert!(config.general.verbose);
        assert_eq!(config.general.workers, 4);
        assert_eq!(config.input.cell_column, "CELL");
        assert_eq!(config.input.date_column, "Date");
        assert_eq!(config.input.delimiter_byte(), b';');
        assert_eq!(config.report.top_n, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.input.delimiter = ";;".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.general.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reports_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[input]\ndelimiter = \"\"\n").unwrap();
        assert!(Config::load(&path).is_err());

        std::fs::write(&path, "[general]\nworkers = 2\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().general.workers, 2);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[rules]"));
        assert!(toml_str.contains("[report]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.input.delimiter, ",");
    }
}
