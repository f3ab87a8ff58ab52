// src/domain/snapshot.rs

use chrono::{DateTime, FixedOffset};
use std::collections::{HashMap, HashSet};

/// `(declared_start, declared_end)` as advertised by the feed.
pub type DeclaredDates = (Option<DateTime<FixedOffset>>, Option<DateTime<FixedOffset>>);

/// One validated feed record. Calendar dates from the feed are already
/// converted to timezone-aware instants: the start at midnight and the end at
/// the last second of its day, both in the feed's timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRecord {
    pub key: String,
    pub label: String,
    pub declared_start: Option<DateTime<FixedOffset>>,
    pub declared_end: Option<DateTime<FixedOffset>>,
}

impl FeedRecord {
    pub fn declared_dates(&self) -> DeclaredDates {
        (self.declared_start, self.declared_end)
    }

    /// A missing start means "already started".
    pub fn has_started(&self, now: DateTime<FixedOffset>) -> bool {
        self.declared_start.map_or(true, |start| start <= now)
    }

    pub fn has_expired(&self, now: DateTime<FixedOffset>) -> bool {
        self.declared_end.map_or(false, |end| end < now)
    }

    pub fn period_start(&self, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        self.declared_start.unwrap_or(now)
    }
}

/// The parsed feed at one point in time, in feed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<FeedRecord>,
    fetch_failed: bool,
}

impl Snapshot {
    pub fn new(records: Vec<FeedRecord>) -> Self {
        Snapshot {
            records,
            fetch_failed: false,
        }
    }

    /// An empty snapshot standing in for a feed that could not be read.
    pub fn failed() -> Self {
        Snapshot {
            records: Vec::new(),
            fetch_failed: true,
        }
    }

    pub fn fetch_failed(&self) -> bool {
        self.fetch_failed
    }

    pub fn records(&self) -> &[FeedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn key_set(&self) -> HashSet<String> {
        self.records.iter().map(|r| r.key.clone()).collect()
    }

    pub fn keys(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.key.as_str()).collect()
    }

    /// Records that should be active right now: started and not past their
    /// declared end.
    pub fn effective(&self, now: DateTime<FixedOffset>) -> Snapshot {
        Snapshot {
            records: self
                .records
                .iter()
                .filter(|r| r.has_started(now) && !r.has_expired(now))
                .cloned()
                .collect(),
            fetch_failed: self.fetch_failed,
        }
    }
}

/// What the last completed cycle observed. Lives only for the process
/// lifetime and is threaded through the scheduler loop by value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviousCycleState {
    keys: HashSet<String>,
    declared: HashMap<String, DeclaredDates>,
    active_keys: HashSet<String>,
    /// Closed by a date edit and not yet reopened by a committed activation.
    pending_reopen: HashSet<String>,
}

impl PreviousCycleState {
    pub fn from_snapshots(raw: &Snapshot, effective: &Snapshot) -> Self {
        PreviousCycleState {
            keys: raw.key_set(),
            declared: raw
                .records
                .iter()
                .map(|r| (r.key.clone(), r.declared_dates()))
                .collect(),
            active_keys: effective.key_set(),
            pending_reopen: HashSet::new(),
        }
    }

    /// The view to hand to the next cycle once this one has run. Parts owned
    /// by a rolled-back step keep their old values so the next cycle sees the
    /// same differences again; everything else moves to what was observed.
    pub fn advance(
        &self,
        raw: &Snapshot,
        effective: &Snapshot,
        dates_committed: bool,
        activation_committed: bool,
        closed_for_dates: &HashSet<String>,
    ) -> Self {
        let mut next = Self::from_snapshots(raw, effective);

        if !dates_committed {
            for (key, dates) in &self.declared {
                if next.keys.contains(key) {
                    next.declared.insert(key.clone(), *dates);
                }
            }
        }

        if !activation_committed {
            next.active_keys = self
                .active_keys
                .intersection(&next.active_keys)
                .cloned()
                .collect();
        }

        next.pending_reopen = self
            .pending_reopen
            .iter()
            .chain(closed_for_dates)
            .filter(|key| next.keys.contains(*key))
            .filter(|key| !(activation_committed && next.active_keys.contains(*key)))
            .cloned()
            .collect();

        next
    }

    /// Whether the key was listed in the raw feed last cycle.
    pub fn listed(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn declared(&self, key: &str) -> Option<&DeclaredDates> {
        self.declared.get(key)
    }

    /// Whether the key was in the effective snapshot last cycle.
    pub fn was_active(&self, key: &str) -> bool {
        self.active_keys.contains(key)
    }

    /// Whether a date edit closed the key in an earlier cycle and its reopening
    /// has not been committed yet.
    pub fn awaiting_reopen(&self, key: &str) -> bool {
        self.pending_reopen.contains(key)
    }
}
