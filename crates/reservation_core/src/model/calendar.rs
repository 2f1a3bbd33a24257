//! Reservation calendar shapes.
//!
//! # Invariants
//! - A date-key present in a [`Calendar`] maps to a non-empty slot set.
//! - Slot sets are duplicate-free and iterate in ascending order.
//! - Persisted entries are ordered by ascending date.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// In-memory calendar: date-key to reserved slot labels.
pub type Calendar = BTreeMap<String, BTreeSet<String>>;

/// One date and its reserved slots, as persisted and listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationEntry {
    pub date: String,
    pub slots: Vec<String>,
}

impl ReservationEntry {
    pub fn new(date: impl Into<String>, slots: &BTreeSet<String>) -> Self {
        Self {
            date: date.into(),
            slots: slots.iter().cloned().collect(),
        }
    }
}

/// Deduplicates and sorts slot labels.
pub fn normalize_slots<I, S>(slots: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    slots.into_iter().map(Into::into).collect()
}

/// Builds a calendar from persisted entries.
///
/// Entries with an empty date or no slots are dropped; a date repeated in
/// the payload keeps its last occurrence.
pub fn calendar_from_entries(entries: Vec<ReservationEntry>) -> Calendar {
    let mut calendar = Calendar::new();
    for entry in entries {
        if entry.date.is_empty() {
            continue;
        }
        let slots = normalize_slots(entry.slots);
        if slots.is_empty() {
            calendar.remove(&entry.date);
        } else {
            calendar.insert(entry.date, slots);
        }
    }
    calendar
}

/// Flattens a calendar into date-ordered entries.
pub fn entries_from_calendar(calendar: &Calendar) -> Vec<ReservationEntry> {
    calendar
        .iter()
        .map(|(date, slots)| ReservationEntry::new(date.as_str(), slots))
        .collect()
}
