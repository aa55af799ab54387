//! Violation aggregation and statistics.
//!
//! The [`Aggregator`] fans every (rule, cell) pair of a technology out over
//! a shared worker pool and merges the emitted records. The free functions
//! below slice the merged list for presentation.

use super::evaluator::evaluate;
use super::window::EvaluationWindow;
use crate::data::ObservationTable;
use crate::error::Result;
use crate::models::{AnalysisResult, AnalysisSummary, Rule, Status, ViolationRecord};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

/// Runs every rule of a technology over every cell of a table.
pub struct Aggregator {
    pool: rayon::ThreadPool,
}

impl Aggregator {
    /// Creates an aggregator backed by a pool of `workers` threads.
    pub fn new(workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("cellaudit-eval-{}", i))
            .build()?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Evaluates `rules` against every cell of `table`.
    ///
    /// Records come back in rule order, then cell order, regardless of
    /// which worker finished first.
    pub fn run(&self, table: &ObservationTable, technology: &str, rules: &[Rule]) -> AnalysisResult {
        let window = EvaluationWindow::latest(table);
        let cells = table.cells();

        info!(
            technology,
            rules = rules.len(),
            cells = cells.len(),
            days = window.dates().len(),
            "Evaluating rules"
        );

        let violations: Vec<ViolationRecord> = self.pool.install(|| {
            rules
                .par_iter()
                .flat_map(|rule| {
                    let found: Vec<ViolationRecord> = cells
                        .par_iter()
                        .filter_map(|cell| evaluate(cell, rule, window.extract(table, cell, rule)))
                        .collect();
                    debug!("{}: {} violating cells", rule.describe(), found.len());
                    found
                })
                .collect()
        });

        let summary = AnalysisSummary::from_records(technology, cells.len(), &violations);
        info!(
            technology,
            violations = violations.len(),
            critical = summary.critical,
            warning = summary.warning,
            healthy = summary.healthy,
            "Analysis complete"
        );

        AnalysisResult {
            summary,
            window: window.dates().to_vec(),
            violations,
        }
    }
}

/// Criteria for narrowing a violation list.
#[derive(Debug, Clone, Default)]
pub struct ViolationFilter {
    pub status: Option<Status>,
    pub kpi: Option<String>,
    /// Case-insensitive substring of the cell name.
    pub cell_contains: Option<String>,
}

impl ViolationFilter {
    /// Returns true if the record passes every set criterion.
    pub fn matches(&self, record: &ViolationRecord) -> bool {
        if self.status.is_some_and(|s| s != record.status) {
            return false;
        }
        if self.kpi.as_deref().is_some_and(|k| k != record.kpi) {
            return false;
        }
        if let Some(ref needle) = self.cell_contains {
            if !record.cell.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }

    /// Returns true if no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.kpi.is_none() && self.cell_contains.is_none()
    }
}

/// Records passing the filter, in input order.
pub fn filter_violations<'a>(
    records: &'a [ViolationRecord],
    filter: &ViolationFilter,
) -> Vec<&'a ViolationRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

/// Sort records by score (highest first), keeping input order among ties.
pub fn sort_by_score(records: &mut [ViolationRecord]) {
    records.sort_by(|a, b| b.score.cmp(&a.score));
}

/// Distinct KPIs in first-appearance order.
pub fn distinct_kpis(records: &[ViolationRecord]) -> Vec<&str> {
    let mut kpis: Vec<&str> = Vec::new();
    for record in records {
        if !kpis.contains(&record.kpi.as_str()) {
            kpis.push(&record.kpi);
        }
    }
    kpis
}

/// Group records by cell.
pub fn group_by_cell(records: &[ViolationRecord]) -> HashMap<&str, Vec<&ViolationRecord>> {
    let mut grouped: HashMap<&str, Vec<&ViolationRecord>> = HashMap::new();

    for record in records {
        grouped.entry(record.cell.as_str()).or_default().push(record);
    }

    grouped
}

/// Cells violating the most rules, with their rule count and worst status.
pub fn most_affected_cells(records: &[ViolationRecord], n: usize) -> Vec<(&str, usize, Status)> {
    let mut cells: Vec<(&str, usize, Status)> = group_by_cell(records)
        .into_iter()
        .map(|(cell, recs)| {
            let worst = recs
                .iter()
                .map(|r| r.status)
                .max()
                .unwrap_or(Status::Warning);
            (cell, recs.len(), worst)
        })
        .collect();

    // Name as final key so HashMap iteration order never leaks into output
    cells.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| b.2.cmp(&a.2))
            .then_with(|| a.0.cmp(b.0))
    });
    cells.truncate(n);
    cells
}

/// Generate a text summary of an analysis.
pub fn generate_summary_text(summary: &AnalysisSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Technology: {}", summary.technology));
    lines.push(format!("Total Cells: {}", summary.total_cells));
    lines.push(format!("- 🟢 Healthy: {}", summary.healthy));
    lines.push(format!(
        "- {} Warning: {}",
        Status::Warning.emoji(),
        summary.warning
    ));
    lines.push(format!(
        "- {} Critical: {}",
        Status::Critical.emoji(),
        summary.critical
    ));

    lines.join("\n")
}
