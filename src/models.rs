//! Data models for the KPI auditor.
//!
//! This module contains the fixed-shape records passed between the rule
//! store, the evaluation engine and the report layer.

use crate::error::{AuditError, Result};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Number of calendar days in the evaluation window.
pub const WINDOW_DAYS: usize = 7;

/// Number of trailing window slots that drive the emission policy.
pub const RECENT_DAYS: usize = 5;

/// Comparison a KPI value must satisfy to be considered healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "==", alias = "=")]
    Equal,
}

impl Operator {
    /// Returns true when `value` satisfies the comparison against `threshold`.
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::GreaterEqual => value >= threshold,
            Operator::LessEqual => value <= threshold,
            Operator::GreaterThan => value > threshold,
            Operator::LessThan => value < threshold,
            Operator::Equal => value == threshold,
        }
    }

    /// Symbol used in rule files and reports.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::GreaterEqual => ">=",
            Operator::LessEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::Equal => "==",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::str::FromStr for Operator {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            ">=" => Ok(Operator::GreaterEqual),
            "<=" => Ok(Operator::LessEqual),
            ">" => Ok(Operator::GreaterThan),
            "<" => Ok(Operator::LessThan),
            "==" | "=" => Ok(Operator::Equal),
            other => Err(AuditError::InvalidRule(format!(
                "unknown operator '{}'",
                other
            ))),
        }
    }
}

/// A threshold rule applied to one KPI column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Name of the KPI column the rule reads.
    pub kpi: String,
    /// Comparison a healthy value satisfies.
    pub operator: Operator,
    /// Threshold the value is compared against.
    pub threshold: f64,
    /// Companion traffic column used to weight failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_column: Option<String>,
    /// Floor the companion count must exceed for a bad day to count as a failure.
    #[serde(default)]
    pub count_threshold: f64,
}

impl Rule {
    /// Creates a rule without a companion count column.
    pub fn new(kpi: impl Into<String>, operator: Operator, threshold: f64) -> Self {
        Self {
            kpi: kpi.into(),
            operator,
            threshold,
            count_column: None,
            count_threshold: 0.0,
        }
    }

    /// Attaches a companion count column and its threshold.
    pub fn with_count(mut self, column: impl Into<String>, threshold: f64) -> Self {
        self.count_column = Some(column.into());
        self.count_threshold = threshold;
        self
    }

    /// Sets the count threshold while leaving the count column unset.
    pub fn with_count_threshold(mut self, threshold: f64) -> Self {
        self.count_threshold = threshold;
        self
    }

    /// Returns true when `value` is within the healthy range.
    pub fn passes(&self, value: f64) -> bool {
        self.operator.check(value, self.threshold)
    }

    /// Checks the rule is usable for evaluation.
    pub fn validate(&self) -> Result<()> {
        if self.kpi.trim().is_empty() {
            return Err(AuditError::InvalidRule("KPI name is empty".to_string()));
        }
        if !self.threshold.is_finite() {
            return Err(AuditError::InvalidRule(format!(
                "{}: threshold must be a finite number",
                self.kpi
            )));
        }
        if !self.count_threshold.is_finite() {
            return Err(AuditError::InvalidRule(format!(
                "{}: count threshold must be a finite number",
                self.kpi
            )));
        }
        if let Some(ref column) = self.count_column {
            if column.trim().is_empty() {
                return Err(AuditError::InvalidRule(format!(
                    "{}: count column is empty",
                    self.kpi
                )));
            }
        }
        Ok(())
    }

    /// Short human-readable form, e.g. `CDR_OPTIMUM < 1`.
    pub fn describe(&self) -> String {
        format!("{} {} {}", self.kpi, self.operator, self.threshold)
    }
}

/// One day of a cell's evaluation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DaySlot {
    /// No row for the day, or the KPI value was null.
    NoData,
    /// A defined KPI value. `count` is `None` when the rule has no count column.
    Observed { value: f64, count: Option<f64> },
}

impl DaySlot {
    /// Returns the KPI value, if any.
    pub fn value(&self) -> Option<f64> {
        match self {
            DaySlot::NoData => None,
            DaySlot::Observed { value, .. } => Some(*value),
        }
    }

    /// Display form of the value: the number or `No Data`.
    pub fn value_label(&self) -> String {
        match self {
            DaySlot::NoData => "No Data".to_string(),
            DaySlot::Observed { value, .. } => value.to_string(),
        }
    }

    /// Display form of the companion count: empty on missing days, `-` without a count column.
    pub fn count_label(&self) -> String {
        match self {
            DaySlot::NoData => String::new(),
            DaySlot::Observed { count: None, .. } => "-".to_string(),
            DaySlot::Observed {
                count: Some(count), ..
            } => count.to_string(),
        }
    }
}

/// Severity of an emitted violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Degraded on 3 or 4 of the last 5 days, including today.
    Warning,
    /// Degraded on every one of the last 5 days.
    Critical,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Warning => write!(f, "Warning"),
            Status::Critical => write!(f, "Critical"),
        }
    }
}

impl Status {
    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            Status::Warning => "🟡",
            Status::Critical => "🔴",
        }
    }
}

/// Result of one rule flagging one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Cell identifier.
    pub cell: String,
    /// KPI the rule reads.
    pub kpi: String,
    /// Window slots, oldest first.
    pub slots: [DaySlot; WINDOW_DAYS],
    /// Bad slots across the whole window.
    pub bad_days: u32,
    /// Bad slots among the last five.
    pub last_5_bad: u32,
    /// Bad slots whose companion count exceeded the count threshold.
    pub failure_number: u32,
    /// `bad_days + last_5_bad + failure_number`, used for ranking.
    pub score: u32,
    /// Critical or Warning.
    pub status: Status,
    /// Whether the most recent slot was bad.
    pub last_day_bad: bool,
}

/// Summary counts for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Technology key the rules were taken from.
    pub technology: String,
    /// Distinct cells present in the dataset.
    pub total_cells: usize,
    /// Distinct cells with at least one Critical record.
    pub critical: usize,
    /// Distinct cells whose worst record is Warning.
    pub warning: usize,
    /// Cells with no records at all.
    pub healthy: usize,
    /// When the summary was produced, in the machine's local time zone.
    pub generated_at: DateTime<Local>,
}

impl AnalysisSummary {
    /// Builds a summary from the emitted records, counting each cell once.
    pub fn from_records(
        technology: &str,
        total_cells: usize,
        records: &[ViolationRecord],
    ) -> Self {
        let critical_cells: HashSet<&str> = records
            .iter()
            .filter(|r| r.status == Status::Critical)
            .map(|r| r.cell.as_str())
            .collect();
        let violating: HashSet<&str> = records.iter().map(|r| r.cell.as_str()).collect();

        let critical = critical_cells.len();
        let warning = violating.len() - critical;

        Self {
            technology: technology.to_string(),
            total_cells,
            critical,
            warning,
            healthy: total_cells.saturating_sub(violating.len()),
            generated_at: Local::now(),
        }
    }

    /// Number of distinct cells that produced any record.
    pub fn violating(&self) -> usize {
        self.critical + self.warning
    }

    /// Local timestamp in the report format.
    pub fn timestamp(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Output of one analysis run for a (dataset, technology) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: AnalysisSummary,
    /// Dates behind the filled window slots, oldest first.
    pub window: Vec<NaiveDate>,
    pub violations: Vec<ViolationRecord>,
}
