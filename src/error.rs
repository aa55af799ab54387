//! Error types for loading, rule handling and analysis.
//!
//! Modules below the binary boundary return [`Result`]; `main.rs` wraps
//! these in `anyhow` with context before reporting them to the user.

use std::path::PathBuf;

/// Errors raised by the audit core.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader or writer rejected the data.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Rule file (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A column the loader cannot work without is absent from the header.
    #[error("required column '{column}' not found in input")]
    MissingColumn { column: String },

    /// A date cell could not be parsed with any accepted day-first format.
    #[error("row {row}: unparseable date '{value}'")]
    InvalidDate { row: usize, value: String },

    /// A data row has no cell identifier.
    #[error("row {row}: missing cell identifier")]
    MissingCellId { row: usize },

    /// The input has no header row at all.
    #[error("input is empty")]
    EmptyDataset,

    /// A rule failed validation (empty KPI name, non-finite threshold, ...).
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// An edit targeted a technology the store does not know.
    #[error("unknown technology '{0}'")]
    UnknownTechnology(String),

    /// The evaluation worker pool could not be started.
    #[error("worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// A background analysis did not produce a result.
    #[error("analysis failed: {0}")]
    Analysis(String),
}

impl AuditError {
    /// Wrap an `std::io::Error` together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience `Result` alias for core operations.
pub type Result<T> = std::result::Result<T, AuditError>;
