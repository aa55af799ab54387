//! In-memory table of daily KPI observations keyed by (cell, date).

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// One input row: a cell's metrics for one calendar day.
///
/// The (cell, date) key lives in the table's index.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Metric values, positionally aligned with the table's columns.
    pub values: Vec<Option<f64>>,
}

/// Daily observations for many cells.
///
/// Dates per cell need not be contiguous. When several rows share a
/// (cell, date) pair, lookups resolve to the first one pushed.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    rows: Vec<Observation>,
    cells: Vec<String>,
    dates: BTreeSet<NaiveDate>,
    index: HashMap<String, HashMap<NaiveDate, usize>>,
}

impl ObservationTable {
    /// Creates an empty table with the given metric columns.
    pub fn new(columns: Vec<String>) -> Self {
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Self {
            columns,
            column_index,
            ..Self::default()
        }
    }

    /// Appends a row. Missing trailing values are treated as null.
    pub fn push(&mut self, cell: impl Into<String>, date: NaiveDate, mut values: Vec<Option<f64>>) {
        let cell = cell.into();
        values.resize(self.columns.len(), None);

        let row_idx = self.rows.len();
        if !self.index.contains_key(&cell) {
            self.cells.push(cell.clone());
        }
        self.index
            .entry(cell)
            .or_default()
            .entry(date)
            .or_insert(row_idx);

        self.dates.insert(date);
        self.rows.push(Observation { values });
    }

    /// Metric column names in header order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns true if the table carries the given metric column.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// Distinct cell identifiers in first-appearance order.
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Number of distinct cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of rows, duplicates included.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The `n` most recent distinct dates, oldest first.
    pub fn latest_dates(&self, n: usize) -> Vec<NaiveDate> {
        let mut latest: Vec<NaiveDate> = self.dates.iter().rev().take(n).copied().collect();
        latest.reverse();
        latest
    }

    /// The row recorded for a cell on a date, if any.
    pub fn row(&self, cell: &str, date: NaiveDate) -> Option<&Observation> {
        let idx = *self.index.get(cell)?.get(&date)?;
        self.rows.get(idx)
    }

    /// A metric value from a row. Absent columns read as null.
    pub fn value(&self, row: &Observation, column: &str) -> Option<f64> {
        let idx = *self.column_index.get(column)?;
        row.values.get(idx).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_cells_keep_first_appearance_order() {
        let mut table = ObservationTable::new(vec!["KPI".to_string()]);
        table.push("B", day(1), vec![Some(1.0)]);
        table.push("A", day(1), vec![Some(2.0)]);
        table.push("B", day(2), vec![Some(3.0)]);

        assert_eq!(table.cells(), &["B".to_string(), "A".to_string()]);
        assert_eq!(table.cell_count(), 2);
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_latest_dates_are_global_and_sorted() {
        let mut table = ObservationTable::new(vec!["KPI".to_string()]);
        for d in [5, 1, 3, 9, 7, 2, 8, 4, 6] {
            table.push("A", day(d), vec![Some(1.0)]);
        }
        table.push("B", day(10), vec![Some(1.0)]);

        let latest = table.latest_dates(7);
        assert_eq!(latest.first(), Some(&day(4)));
        assert_eq!(latest.last(), Some(&day(10)));
        assert_eq!(latest.len(), 7);

        assert_eq!(table.latest_dates(20).len(), 10);
    }

    #[test]
    fn test_duplicate_rows_first_wins() {
        let mut table = ObservationTable::new(vec!["KPI".to_string()]);
        table.push("A", day(1), vec![Some(10.0)]);
        table.push("A", day(1), vec![Some(20.0)]);

        let row = table.row("A", day(1)).unwrap();
        assert_eq!(table.value(row, "KPI"), Some(10.0));
    }

    #[test]
    fn test_missing_values_and_columns_read_as_null() {
        let mut table = ObservationTable::new(vec!["KPI".to_string(), "Count".to_string()]);
        table.push("A", day(1), vec![Some(10.0)]);

        let row = table.row("A", day(1)).unwrap();
        assert_eq!(table.value(row, "Count"), None);
        assert_eq!(table.value(row, "Unknown"), None);
        assert!(table.row("A", day(2)).is_none());
        assert!(table.row("Z", day(1)).is_none());
    }
}
