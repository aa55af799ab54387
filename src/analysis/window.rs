//! Evaluation window extraction.
//!
//! The window is the last seven distinct dates of the whole dataset, not of
//! each cell. A cell without a row on one of those dates gets a `NoData`
//! slot at that position instead of a window shifted onto older data.

use crate::data::ObservationTable;
use crate::models::{DaySlot, Rule, WINDOW_DAYS};
use chrono::NaiveDate;

/// The dates making up an evaluation window, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationWindow {
    dates: Vec<NaiveDate>,
}

impl EvaluationWindow {
    /// Builds the window from the table's most recent dates.
    pub fn latest(table: &ObservationTable) -> Self {
        Self::from_dates(table.latest_dates(WINDOW_DAYS))
    }

    /// Rebuilds a window from dates recorded in a result, oldest first.
    ///
    /// Only the last seven are kept.
    pub fn from_dates(mut dates: Vec<NaiveDate>) -> Self {
        if dates.len() > WINDOW_DAYS {
            dates.drain(..dates.len() - WINDOW_DAYS);
        }
        Self { dates }
    }

    /// Dates covered by the window. Shorter than seven on short histories.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// The date behind slot `index` (0-based), if the history reaches that far.
    pub fn date_at(&self, index: usize) -> Option<NaiveDate> {
        let offset = WINDOW_DAYS - self.dates.len();
        index
            .checked_sub(offset)
            .and_then(|i| self.dates.get(i))
            .copied()
    }

    /// Aligns one cell's values for `rule` onto the seven window slots.
    ///
    /// Unfilled leading slots, missing rows and null KPI values become
    /// `NoData`. The companion count defaults to 0 when the rule names a
    /// count column the row does not carry.
    pub fn extract(&self, table: &ObservationTable, cell: &str, rule: &Rule) -> [DaySlot; WINDOW_DAYS] {
        let mut slots = [DaySlot::NoData; WINDOW_DAYS];
        let offset = WINDOW_DAYS - self.dates.len();

        for (i, date) in self.dates.iter().enumerate() {
            let Some(row) = table.row(cell, *date) else {
                continue;
            };
            let Some(value) = table.value(row, &rule.kpi) else {
                continue;
            };

            let count = rule
                .count_column
                .as_deref()
                .map(|column| table.value(row, column).unwrap_or(0.0));

            slots[offset + i] = DaySlot::Observed { value, count };
        }

        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operator;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn table() -> ObservationTable {
        ObservationTable::new(vec!["KPI".to_string(), "Attempts".to_string()])
    }

    #[test]
    fn test_full_window() {
        let mut t = table();
        for d in 1..=9 {
            t.push("A", day(d), vec![Some(d as f64), Some(100.0)]);
        }
        let window = EvaluationWindow::latest(&t);
        let rule = Rule::new("KPI", Operator::GreaterThan, 0.0);
        let slots = window.extract(&t, "A", &rule);

        assert_eq!(window.dates().len(), 7);
        assert_eq!(slots[0].value(), Some(3.0));
        assert_eq!(slots[6].value(), Some(9.0));
        assert_eq!(slots[6].count_label(), "-");
    }

    #[test]
    fn test_short_history_leaves_leading_slots_empty() {
        let mut t = table();
        for d in 1..=3 {
            t.push("A", day(d), vec![Some(1.0), None]);
        }
        let window = EvaluationWindow::latest(&t);
        let rule = Rule::new("KPI", Operator::GreaterThan, 0.0);
        let slots = window.extract(&t, "A", &rule);

        assert!(slots[..4].iter().all(|s| *s == DaySlot::NoData));
        assert!(slots[4..].iter().all(|s| s.value() == Some(1.0)));
        assert_eq!(window.date_at(3), None);
        assert_eq!(window.date_at(4), Some(day(1)));
        assert_eq!(window.date_at(6), Some(day(3)));
    }

    #[test]
    fn test_gaps_use_global_dates() {
        let mut t = table();
        for d in 1..=7 {
            t.push("B", day(d), vec![Some(1.0), None]);
        }
        // A only has data on days 2 and 7
        t.push("A", day(2), vec![Some(5.0), None]);
        t.push("A", day(7), vec![Some(6.0), None]);

        let window = EvaluationWindow::latest(&t);
        let rule = Rule::new("KPI", Operator::GreaterThan, 0.0);
        let slots = window.extract(&t, "A", &rule);

        assert_eq!(slots[1].value(), Some(5.0));
        assert_eq!(slots[6].value(), Some(6.0));
        assert_eq!(slots.iter().filter(|s| **s == DaySlot::NoData).count(), 5);
    }

    #[test]
    fn test_count_column_defaults_to_zero() {
        let mut t = table();
        t.push("A", day(1), vec![Some(1.0), None]);
        t.push("A", day(2), vec![Some(1.0), Some(42.0)]);

        let window = EvaluationWindow::latest(&t);
        let rule = Rule::new("KPI", Operator::GreaterThan, 0.0).with_count("Attempts", 10.0);
        let slots = window.extract(&t, "A", &rule);

        assert_eq!(
            slots[5],
            DaySlot::Observed {
                value: 1.0,
                count: Some(0.0)
            }
        );
        assert_eq!(slots[6].count_label(), "42");
    }

    #[test]
    fn test_null_kpi_is_no_data() {
        let mut t = table();
        t.push("A", day(1), vec![None, Some(500.0)]);

        let window = EvaluationWindow::latest(&t);
        let rule = Rule::new("KPI", Operator::GreaterThan, 0.0).with_count("Attempts", 10.0);
        let slots = window.extract(&t, "A", &rule);

        assert_eq!(slots[6], DaySlot::NoData);
        assert_eq!(slots[6].count_label(), "");
    }
}
