// src/db/cycles.rs
use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::errors::AppError;

#[derive(Debug, Serialize)]
pub struct CycleRun {
    pub id: i64,
    pub started_at: DateTime<FixedOffset>,
    pub finished_at: Option<DateTime<FixedOffset>>,
    pub records_seen: Option<i64>,
    pub fetch_failed: bool,
    pub transitions: Option<i64>,
    pub delivery_failures: Option<i64>,
    pub error_message: Option<String>,
}

/// Counters collected while a cycle runs.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleSummary {
    pub records_seen: usize,
    pub fetch_failed: bool,
    pub transitions: usize,
    pub delivery_failures: usize,
    pub error: Option<String>,
}

pub fn start_cycle_run(conn: &Connection, now: DateTime<FixedOffset>) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO cycle_runs (started_at) VALUES (?)",
        params![now],
    )
    .map_err(|e| AppError::DbError(e.to_string()))?;
    Ok(conn.last_insert_rowid())
}

pub fn end_cycle_run(
    conn: &Connection,
    run_id: i64,
    now: DateTime<FixedOffset>,
    summary: &CycleSummary,
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE cycle_runs SET finished_at = ?, records_seen = ?, fetch_failed = ?, transitions = ?, delivery_failures = ?, error_message = ? WHERE id = ?",
        params![
            now,
            summary.records_seen as i64,
            summary.fetch_failed,
            summary.transitions as i64,
            summary.delivery_failures as i64,
            summary.error,
            run_id
        ],
    )
    .map_err(|e| AppError::DbError(e.to_string()))?;
    Ok(())
}

pub fn recent_cycles(conn: &Connection) -> Result<Vec<CycleRun>, AppError> {
    let mut stmt = conn
        .prepare("SELECT id, started_at, finished_at, records_seen, fetch_failed, transitions, delivery_failures, error_message FROM cycle_runs ORDER BY id DESC LIMIT 50")
        .map_err(|e| AppError::DbError(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(CycleRun {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                records_seen: row.get(3)?,
                fetch_failed: row.get(4)?,
                transitions: row.get(5)?,
                delivery_failures: row.get(6)?,
                error_message: row.get(7)?,
            })
        })
        .map_err(|e| AppError::DbError(e.to_string()))?;

    let mut runs = Vec::new();
    for r in rows {
        runs.push(r.map_err(|e| AppError::DbError(e.to_string()))?);
    }
    Ok(runs)
}
