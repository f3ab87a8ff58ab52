use crate::db::connection::{init_db, Database};
use crate::domain::{FeedRecord, Snapshot};
use crate::errors::AppError;
use crate::feed::{FeedSource, Fetched};
use crate::notify::{DeliveryError, RecipientDirectory, Transport};
use chrono::{DateTime, FixedOffset, TimeZone};
use std::collections::VecDeque;
use std::sync::Mutex;
use tempfile::TempDir;

/// Initialize a fresh test DB in its own directory using the production schema.
/// Keep the `TempDir` alive for as long as the database is used.
pub fn init_test_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("test_db.sqlite3");
    let db = Database::new(path.to_string_lossy().into_owned());

    init_db(&db).unwrap_or_else(|e| panic!("Database initialization failed: {e}"));

    (dir, db)
}

pub fn msk() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).unwrap()
}

pub fn msk_at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<FixedOffset> {
    msk().with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

pub fn record(
    key: &str,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
) -> FeedRecord {
    FeedRecord {
        key: key.to_string(),
        label: format!("server {key}"),
        declared_start: start,
        declared_end: end,
    }
}

pub fn feed(keys: &[&str]) -> Snapshot {
    Snapshot::new(keys.iter().map(|k| record(k, None, None)).collect())
}

/// Captures every send; optionally fails for chosen destinations.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(i64, String)>>,
    failing: Vec<i64>,
}

impl RecordingTransport {
    pub fn failing_for(failing: Vec<i64>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing,
        }
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, destination: i64, text: &str) -> Result<(), DeliveryError> {
        if self.failing.contains(&destination) {
            return Err(DeliveryError::Rejected("blocked".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination, text.to_string()));
        Ok(())
    }
}

pub struct StaticDirectory(pub Vec<i64>);

impl RecipientDirectory for StaticDirectory {
    fn list_destinations(&self) -> Result<Vec<i64>, AppError> {
        Ok(self.0.clone())
    }
}

/// Hands out queued snapshots one per fetch, then failed ones.
pub struct ScriptedFeed {
    queue: Mutex<VecDeque<Snapshot>>,
}

impl ScriptedFeed {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self {
            queue: Mutex::new(snapshots.into()),
        }
    }
}

impl FeedSource for ScriptedFeed {
    fn fetch(&self, now: DateTime<FixedOffset>) -> Fetched {
        let raw = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(Snapshot::failed);
        Fetched::from_raw(raw, now)
    }
}
