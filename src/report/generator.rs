//! Report generation.
//!
//! This module renders an analysis result as a Markdown report, a JSON
//! dump or a flat CSV export of the violation list.

use crate::analysis::window::EvaluationWindow;
use crate::analysis::{
    distinct_kpis, filter_violations, most_affected_cells, sort_by_score, worst_cells,
    ViolationFilter,
};
use crate::error::{AuditError, Result};
use crate::models::{AnalysisResult, AnalysisSummary, DaySlot, Rule, Status, ViolationRecord, WINDOW_DAYS};
use crate::rules::RuleStore;
use serde::Serialize;

/// Everything besides the result that shapes a report.
#[derive(Debug, Clone)]
pub struct ReportOptions<'a> {
    /// Name of the analyzed input, shown in the metadata.
    pub source: &'a str,
    /// Rules the result was produced with.
    pub rules: &'a RuleStore,
    pub filter: &'a ViolationFilter,
    /// Worst cells listed per KPI.
    pub top_n: usize,
    /// Render the D1..D7 columns.
    pub include_slots: bool,
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(result: &AnalysisResult, options: &ReportOptions<'_>) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# CellAudit Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(result, options));

    // Summary section
    output.push_str(&generate_summary_section(&result.summary));

    let filtered: Vec<ViolationRecord> = filter_violations(&result.violations, options.filter)
        .into_iter()
        .cloned()
        .collect();

    // Most affected cells
    output.push_str(&generate_affected_section(&filtered, options.top_n));

    // Worst cells per KPI
    output.push_str(&generate_kpi_sections(result, &filtered, options));

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(result: &AnalysisResult, options: &ReportOptions<'_>) -> String {
    let mut section = String::new();
    let technology = &result.summary.technology;

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Input:** `{}`\n", options.source));
    section.push_str(&format!("- **Technology:** {}\n", technology));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        result.summary.timestamp()
    ));
    match (result.window.first(), result.window.last()) {
        (Some(first), Some(last)) => section.push_str(&format!(
            "- **Window:** {} to {} ({} days)\n",
            first,
            last,
            result.window.len()
        )),
        _ => section.push_str("- **Window:** no dated rows\n"),
    }
    section.push_str(&format!(
        "- **Rules Applied:** {}\n",
        options.rules.rules_for(technology).len()
    ));
    if !options.filter.is_empty() {
        section.push_str(&format!("- **Filter:** {}\n", describe_filter(options.filter)));
    }
    section.push('\n');

    section
}

fn describe_filter(filter: &ViolationFilter) -> String {
    let mut parts = Vec::new();
    if let Some(status) = filter.status {
        parts.push(format!("status = {}", status));
    }
    if let Some(ref kpi) = filter.kpi {
        parts.push(format!("KPI = `{}`", kpi));
    }
    if let Some(ref cell) = filter.cell_contains {
        parts.push(format!("cell contains `{}`", cell));
    }
    parts.join(", ")
}

/// Generate the summary section.
fn generate_summary_section(summary: &AnalysisSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "| 🟢 Healthy | {} Warning | {} Critical | **Total Cells** |\n",
        Status::Warning.emoji(),
        Status::Critical.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.healthy, summary.warning, summary.critical, summary.total_cells
    ));

    section
}

/// Generate the most affected cells section.
fn generate_affected_section(records: &[ViolationRecord], n: usize) -> String {
    let affected = most_affected_cells(records, n);
    if affected.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Most Affected Cells\n\n");
    section.push_str("| Cell | Violated Rules | Worst Status |\n");
    section.push_str("|:---|:---:|:---:|\n");

    for (cell, count, status) in affected {
        section.push_str(&format!(
            "| `{}` | {} | {} {} |\n",
            cell,
            count,
            status.emoji(),
            status
        ));
    }
    section.push('\n');

    section
}

/// Generate one worst-cells table per KPI.
fn generate_kpi_sections(
    result: &AnalysisResult,
    records: &[ViolationRecord],
    options: &ReportOptions<'_>,
) -> String {
    let mut section = String::new();

    section.push_str("## Worst Cells by KPI\n\n");

    let kpis = distinct_kpis(records);
    if kpis.is_empty() {
        section.push_str("No degraded cells match the selection. 🎉\n\n");
        return section;
    }

    let window = EvaluationWindow::from_dates(result.window.clone());
    let technology = &result.summary.technology;

    for kpi in kpis {
        let rule = options.rules.rule_for_kpi(technology, kpi);

        section.push_str(&format!("### {}\n\n", kpi));
        if let Some(rule) = rule {
            section.push_str(&format!("*Healthy when `{}`*\n\n", rule.describe()));
        }

        section.push_str(&table_header(&window, options.include_slots));
        for (rank, record) in worst_cells(records, kpi, options.top_n).into_iter().enumerate() {
            section.push_str(&table_row(rank + 1, record, rule, options.include_slots));
        }
        section.push('\n');
    }

    section
}

fn table_header(window: &EvaluationWindow, include_slots: bool) -> String {
    let mut header = String::from("| # | Cell | Status | Score | Bad Days | Last 5 | Failures |");
    let mut align = String::from("|:---:|:---|:---:|:---:|:---:|:---:|:---:|");

    if include_slots {
        for i in 0..WINDOW_DAYS {
            match window.date_at(i) {
                Some(date) => header.push_str(&format!(" D{} ({}) |", i + 1, date.format("%d/%m"))),
                None => header.push_str(&format!(" D{} |", i + 1)),
            }
            align.push_str(":---:|");
        }
    }

    format!("{}\n{}\n", header, align)
}

fn table_row(rank: usize, record: &ViolationRecord, rule: Option<&Rule>, include_slots: bool) -> String {
    let mut row = format!(
        "| {} | `{}` | {} {} | {} | {} | {} | {} |",
        rank,
        record.cell,
        record.status.emoji(),
        record.status,
        record.score,
        record.bad_days,
        record.last_5_bad,
        record.failure_number
    );

    if include_slots {
        for slot in &record.slots {
            row.push_str(&format!(" {} |", slot_cell(slot, rule)));
        }
    }

    row.push('\n');
    row
}

/// Render one slot as `value mark (count)`.
fn slot_cell(slot: &DaySlot, rule: Option<&Rule>) -> String {
    let Some(value) = slot.value() else {
        return slot.value_label();
    };

    let mark = match rule {
        Some(rule) if rule.passes(value) => " ✅",
        Some(_) => " ❌",
        None => "",
    };
    let count = slot.count_label();
    if count == "-" {
        format!("{}{}", slot.value_label(), mark)
    } else {
        format!("{}{} ({})", slot.value_label(), mark, count)
    }
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by CellAudit v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a AnalysisSummary,
    window: &'a [chrono::NaiveDate],
    violations: Vec<&'a ViolationRecord>,
}

/// Generate a JSON report of the result, with the filter applied to the violations.
pub fn generate_json_report(result: &AnalysisResult, filter: &ViolationFilter) -> Result<String> {
    let report = JsonReport {
        summary: &result.summary,
        window: &result.window,
        violations: filter_violations(&result.violations, filter),
    };
    serde_json::to_string_pretty(&report).map_err(Into::into)
}

/// Generate a CSV export of the filtered violations, highest score first.
pub fn generate_csv_report(result: &AnalysisResult, filter: &ViolationFilter) -> Result<String> {
    let mut records: Vec<ViolationRecord> = filter_violations(&result.violations, filter)
        .into_iter()
        .cloned()
        .collect();
    sort_by_score(&mut records);

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<String> = [
        "Cell Name",
        "KPI",
        "Status",
        "Score",
        "Bad Days",
        "Last 5 Days",
        "Failure Number",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for i in 1..=WINDOW_DAYS {
        header.push(format!("D{}", i));
        header.push(format!("D{}_count", i));
    }
    writer.write_record(&header)?;

    for record in &records {
        let mut row = vec![
            record.cell.clone(),
            record.kpi.clone(),
            record.status.to_string(),
            record.score.to_string(),
            record.bad_days.to_string(),
            record.last_5_bad.to_string(),
            record.failure_number.to_string(),
        ];
        for slot in &record.slots {
            row.push(slot.value_label());
            row.push(slot.count_label());
        }
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AuditError::Csv(e.into_error().into()))?;
    // csv only writes the UTF-8 it was given
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operator;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn rules() -> RuleStore {
        let mut map = BTreeMap::new();
        map.insert(
            "3G".to_string(),
            vec![
                Rule::new("CSSR", Operator::GreaterEqual, 98.0).with_count("Attempts", 10.0),
                Rule::new("RTWP", Operator::LessThan, -95.0),
            ],
        );
        RuleStore::from_map(map).unwrap()
    }

    fn observed(value: f64, count: Option<f64>) -> DaySlot {
        DaySlot::Observed { value, count }
    }

    fn record(cell: &str, kpi: &str, score: u32, status: Status) -> ViolationRecord {
        let mut slots = [observed(97.0, Some(50.0)); WINDOW_DAYS];
        slots[0] = DaySlot::NoData;
        slots[1] = observed(99.0, Some(12.0));
        ViolationRecord {
            cell: cell.to_string(),
            kpi: kpi.to_string(),
            slots,
            bad_days: 5,
            last_5_bad: 5,
            failure_number: 2,
            score,
            status,
            last_day_bad: true,
        }
    }

    fn create_test_result() -> AnalysisResult {
        let violations = vec![
            record("CELL_A", "CSSR", 10, Status::Warning),
            record("CELL_B", "CSSR", 12, Status::Critical),
            record("CELL_A", "RTWP", 15, Status::Critical),
        ];
        AnalysisResult {
            summary: AnalysisSummary::from_records("3G", 4, &violations),
            window: (1..=7)
                .map(|d| NaiveDate::from_ymd_opt(2024, 7, d).unwrap())
                .collect(),
            violations,
        }
    }

    fn options<'a>(rules: &'a RuleStore, filter: &'a ViolationFilter) -> ReportOptions<'a> {
        ReportOptions {
            source: "kpi_3g.csv",
            rules,
            filter,
            top_n: 5,
            include_slots: true,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let result = create_test_result();
        let rules = rules();
        let filter = ViolationFilter::default();
        let markdown = generate_markdown_report(&result, &options(&rules, &filter));

        assert!(markdown.contains("# CellAudit Report"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("`kpi_3g.csv`"));
        assert!(markdown.contains("2024-07-01 to 2024-07-07 (7 days)"));
        assert!(markdown.contains("## Summary"));
        assert!(markdown.contains("| 2 | 0 | 2 | **4** |"));
        assert!(markdown.contains("## Most Affected Cells"));
        assert!(markdown.contains("### CSSR"));
        assert!(markdown.contains("*Healthy when `CSSR >= 98`*"));
        assert!(markdown.contains("D7 (07/07)"));
        assert!(markdown.contains("No Data"));
    }

    #[test]
    fn test_worst_cells_ranked_in_markdown() {
        let result = create_test_result();
        let rules = rules();
        let filter = ViolationFilter::default();
        let markdown = generate_markdown_report(&result, &options(&rules, &filter));

        let b = markdown.find("| 1 | `CELL_B`").unwrap();
        let a = markdown.find("| 2 | `CELL_A`").unwrap();
        assert!(b < a);
    }

    #[test]
    fn test_markdown_respects_filter_and_slots_flag() {
        let result = create_test_result();
        let rules = rules();
        let filter = ViolationFilter {
            kpi: Some("RTWP".to_string()),
            ..Default::default()
        };
        let mut opts = options(&rules, &filter);
        opts.include_slots = false;
        let markdown = generate_markdown_report(&result, &opts);

        assert!(markdown.contains("KPI = `RTWP`"));
        assert!(markdown.contains("### RTWP"));
        assert!(!markdown.contains("### CSSR"));
        assert!(!markdown.contains("D1"));
    }

    #[test]
    fn test_empty_selection() {
        let result = create_test_result();
        let rules = rules();
        let filter = ViolationFilter {
            cell_contains: Some("nothing".to_string()),
            ..Default::default()
        };
        let markdown = generate_markdown_report(&result, &options(&rules, &filter));
        assert!(markdown.contains("No degraded cells match the selection."));
        assert!(!markdown.contains("## Most Affected Cells"));
    }

    #[test]
    fn test_slot_cell_marks() {
        let rule = Rule::new("CSSR", Operator::GreaterEqual, 98.0);
        assert_eq!(slot_cell(&DaySlot::NoData, Some(&rule)), "No Data");
        assert_eq!(slot_cell(&observed(99.0, None), Some(&rule)), "99 ✅");
        assert_eq!(slot_cell(&observed(97.5, Some(12.0)), Some(&rule)), "97.5 ❌ (12)");
        assert_eq!(slot_cell(&observed(97.5, None), None), "97.5");
    }

    #[test]
    fn test_generate_json_report() {
        let result = create_test_result();
        let filter = ViolationFilter {
            status: Some(Status::Critical),
            ..Default::default()
        };
        let json = generate_json_report(&result, &filter).unwrap();

        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"window\""));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["violations"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["summary"]["technology"], "3G");
    }

    #[test]
    fn test_generate_csv_report() {
        let result = create_test_result();
        let csv = generate_csv_report(&result, &ViolationFilter::default()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Cell Name,KPI,Status,Score,Bad Days,Last 5 Days,Failure Number,D1,D1_count,D2"));
        assert!(lines[0].ends_with("D7,D7_count"));
        assert!(lines[1].starts_with("CELL_A,RTWP,Critical,15,"));
        assert!(lines[2].starts_with("CELL_B,CSSR,Critical,12,5,5,2,No Data,,99,12,"));
    }
}
