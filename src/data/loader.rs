//! CSV input provider for observation tables.
//!
//! Expects one row per (cell, day) with a cell column, a day-first date
//! column and one numeric column per metric. Every column other than the
//! cell and date columns is read as a metric.

use super::table::ObservationTable;
use crate::error::{AuditError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const NULL_MARKERS: &[&str] = &["", "-", "nan", "null", "none", "n/a", "#n/a"];

/// Column layout of the input file.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub cell_column: String,
    pub date_column: String,
    pub delimiter: u8,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            cell_column: "Cell Name".to_string(),
            date_column: "Date".to_string(),
            delimiter: b',',
        }
    }
}

impl From<&crate::config::InputConfig> for LoaderOptions {
    fn from(config: &crate::config::InputConfig) -> Self {
        Self {
            cell_column: config.cell_column.clone(),
            date_column: config.date_column.clone(),
            delimiter: config.delimiter_byte(),
        }
    }
}

/// Load an observation table from a CSV file.
pub fn load_csv(path: &Path, options: &LoaderOptions) -> Result<ObservationTable> {
    let file = std::fs::File::open(path).map_err(|e| AuditError::io(path, e))?;
    let table = read_csv(file, options)?;
    info!(
        "Loaded {} rows for {} cells from {}",
        table.row_count(),
        table.cell_count(),
        path.display()
    );
    Ok(table)
}

/// Read an observation table from any CSV source.
pub fn read_csv<R: Read>(reader: R, options: &LoaderOptions) -> Result<ObservationTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(AuditError::EmptyDataset);
    }

    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AuditError::MissingColumn {
                column: name.to_string(),
            })
    };
    let cell_idx = find(&options.cell_column)?;
    let date_idx = find(&options.date_column)?;

    let metric_idx: Vec<usize> = (0..headers.len())
        .filter(|&i| i != cell_idx && i != date_idx)
        .collect();
    let columns: Vec<String> = metric_idx.iter().map(|&i| headers[i].to_string()).collect();

    let mut table = ObservationTable::new(columns);
    debug!("Metric columns: {:?}", table.columns());
    let mut unparsed = 0usize;

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1
        let row = i + 2;

        let cell = record.get(cell_idx).unwrap_or("");
        if cell.is_empty() {
            return Err(AuditError::MissingCellId { row });
        }

        let raw_date = record.get(date_idx).unwrap_or("");
        let date = parse_day_first(raw_date).ok_or_else(|| AuditError::InvalidDate {
            row,
            value: raw_date.to_string(),
        })?;

        let values = metric_idx
            .iter()
            .map(|&idx| {
                let raw = record.get(idx).unwrap_or("");
                let value = parse_metric(raw);
                if value.is_none() && !is_null_marker(raw) {
                    unparsed += 1;
                }
                value
            })
            .collect();

        table.push(cell, date, values);
    }

    if unparsed > 0 {
        warn!("{} metric values were not numeric and are treated as missing", unparsed);
    }
    if table.is_empty() {
        warn!("Input has a header but no data rows");
    }

    Ok(table)
}

/// Parse a date written day-first, with or without a time part.
pub fn parse_day_first(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parse a metric cell; null markers, garbage and non-finite numbers read as missing.
pub fn parse_metric(raw: &str) -> Option<f64> {
    if is_null_marker(raw) {
        return None;
    }
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn is_null_marker(raw: &str) -> bool {
    let lowered = raw.trim().to_lowercase();
    NULL_MARKERS.contains(&lowered.as_str())
}
