//! Worst-cell ranking for a single KPI.

use crate::models::ViolationRecord;

/// The `n` highest-scoring records for `kpi`.
///
/// Ties keep their input order. Returns fewer than `n` records when fewer
/// match.
pub fn worst_cells<'a>(records: &'a [ViolationRecord], kpi: &str, n: usize) -> Vec<&'a ViolationRecord> {
    let mut matching: Vec<&ViolationRecord> = records.iter().filter(|r| r.kpi == kpi).collect();
    // sort_by is stable
    matching.sort_by(|a, b| b.score.cmp(&a.score));
    matching.truncate(n);
    matching
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DaySlot, Status, WINDOW_DAYS};

    fn record(cell: &str, kpi: &str, score: u32) -> ViolationRecord {
        ViolationRecord {
            cell: cell.to_string(),
            kpi: kpi.to_string(),
            slots: [DaySlot::NoData; WINDOW_DAYS],
            bad_days: 0,
            last_5_bad: 0,
            failure_number: 0,
            score,
            status: Status::Warning,
            last_day_bad: true,
        }
    }

    fn cells(records: &[&ViolationRecord]) -> Vec<String> {
        records.iter().map(|r| r.cell.clone()).collect()
    }

    #[test]
    fn test_worst_cells_sorted_and_filtered() {
        let records = vec![
            record("A", "CSSR", 7),
            record("B", "CDR", 19),
            record("C", "CSSR", 12),
            record("D", "CSSR", 9),
        ];

        let worst = worst_cells(&records, "CSSR", 2);
        assert_eq!(cells(&worst), vec!["C", "D"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let records = vec![
            record("A", "CSSR", 8),
            record("B", "CSSR", 10),
            record("C", "CSSR", 8),
            record("D", "CSSR", 8),
        ];

        let worst = worst_cells(&records, "CSSR", 3);
        assert_eq!(cells(&worst), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_fewer_matches_than_requested() {
        let records = vec![record("A", "CSSR", 8)];
        assert_eq!(worst_cells(&records, "CSSR", 5).len(), 1);
        assert!(worst_cells(&records, "CDR", 5).is_empty());
        assert!(worst_cells(&[], "CSSR", 5).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let records = vec![
            record("A", "CSSR", 8),
            record("B", "CSSR", 8),
            record("C", "CSSR", 11),
        ];
        let first = cells(&worst_cells(&records, "CSSR", 5));
        let second = cells(&worst_cells(&records, "CSSR", 5));
        assert_eq!(first, second);
    }
}
