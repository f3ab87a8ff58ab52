// src/domain/entry.rs

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// A tracked advertised item as stored in the `entries` table.
/// Rows are never deleted; `is_active` is toggled as the item comes and goes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub key: String,
    pub label: String,
    pub is_active: bool,
    pub current_period_start: Option<DateTime<FixedOffset>>,
    /// Declared end from the feed while active, the closing moment once inactive.
    pub current_period_end: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

/// One contiguous interval during which an entry was advertised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryPeriod {
    pub id: i64,
    pub entry_key: String,
    pub start: DateTime<FixedOffset>,
    pub end: Option<DateTime<FixedOffset>>,
}

impl EntryPeriod {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Whole days between start and end, `None` while the period is still open.
    pub fn days_active(&self) -> Option<i64> {
        self.end.map(|end| elapsed_days(self.start, end))
    }
}

pub fn elapsed_days(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> i64 {
    (end - start).num_days().max(0)
}
