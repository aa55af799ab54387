//! Per-cell rule evaluation.
//!
//! A slot is bad when it holds a value that fails the rule's comparison.
//! `NoData` slots are never bad. A record is only emitted for a cell that
//! was bad on at least three of the last five days and is still bad on the
//! most recent one.

use crate::models::{DaySlot, Rule, Status, ViolationRecord, RECENT_DAYS, WINDOW_DAYS};

/// Minimum bad slots among the last five for a record to be emitted.
pub const MIN_RECENT_BAD: u32 = 3;

/// Bad-slot counts for one cell under one rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotTally {
    pub bad_days: u32,
    pub last_5_bad: u32,
    pub failure_number: u32,
    pub last_day_bad: bool,
}

impl SlotTally {
    /// Counts bad slots in a window.
    pub fn count(rule: &Rule, slots: &[DaySlot; WINDOW_DAYS]) -> Self {
        let recent_start = WINDOW_DAYS - RECENT_DAYS;
        let mut tally = Self::default();

        for (i, slot) in slots.iter().enumerate() {
            let DaySlot::Observed { value, count } = *slot else {
                continue;
            };
            if rule.passes(value) {
                continue;
            }

            tally.bad_days += 1;
            if i >= recent_start {
                tally.last_5_bad += 1;
            }
            // `count` is only set when the rule names a count column
            if count.is_some_and(|c| c > rule.count_threshold) {
                tally.failure_number += 1;
            }
            if i == WINDOW_DAYS - 1 {
                tally.last_day_bad = true;
            }
        }

        tally
    }

    /// Whether the degradation policy flags the cell.
    pub fn is_violation(&self) -> bool {
        self.last_5_bad >= MIN_RECENT_BAD && self.last_day_bad
    }

    /// Critical when every one of the last five days was bad.
    pub fn status(&self) -> Status {
        if self.last_5_bad as usize == RECENT_DAYS {
            Status::Critical
        } else {
            Status::Warning
        }
    }

    /// Ranking score.
    pub fn score(&self) -> u32 {
        self.bad_days + self.last_5_bad + self.failure_number
    }
}

/// Evaluates one rule against one cell's window.
pub fn evaluate(cell: &str, rule: &Rule, slots: [DaySlot; WINDOW_DAYS]) -> Option<ViolationRecord> {
    let tally = SlotTally::count(rule, &slots);
    if !tally.is_violation() {
        return None;
    }

    Some(ViolationRecord {
        cell: cell.to_string(),
        kpi: rule.kpi.clone(),
        slots,
        bad_days: tally.bad_days,
        last_5_bad: tally.last_5_bad,
        failure_number: tally.failure_number,
        score: tally.score(),
        status: tally.status(),
        last_day_bad: tally.last_day_bad,
    })
}
