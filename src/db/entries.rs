// src/db/entries.rs
use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::domain::{Entry, EntryPeriod};
use crate::errors::AppError;

const ENTRY_COLUMNS: &str =
    "key, label, is_active, current_period_start, current_period_end, created_at";

fn entry_from_row(r: &Row) -> rusqlite::Result<Entry> {
    Ok(Entry {
        key: r.get(0)?,
        label: r.get(1)?,
        is_active: r.get(2)?,
        current_period_start: r.get(3)?,
        current_period_end: r.get(4)?,
        created_at: r.get(5)?,
    })
}

fn period_from_row(r: &Row) -> rusqlite::Result<EntryPeriod> {
    Ok(EntryPeriod {
        id: r.get(0)?,
        entry_key: r.get(1)?,
        start: r.get(2)?,
        end: r.get(3)?,
    })
}

pub fn find_entry(conn: &Connection, key: &str) -> Result<Option<Entry>, AppError> {
    conn.query_row(
        &format!("select {ENTRY_COLUMNS} from entries where key = ?"),
        params![key],
        entry_from_row,
    )
    .optional()
    .map_err(|e| AppError::DbError(format!("find entry failed: {e}")))
}

/// Insert a brand new entry in the active state.
pub fn insert_entry(
    conn: &Connection,
    key: &str,
    label: &str,
    start: DateTime<FixedOffset>,
    declared_end: Option<DateTime<FixedOffset>>,
    now: DateTime<FixedOffset>,
) -> Result<(), AppError> {
    conn.execute(
        "insert into entries (key, label, is_active, current_period_start, current_period_end, created_at)
         values (?, ?, 1, ?, ?, ?)",
        params![key, label, start, declared_end, now],
    )
    .map_err(|e| AppError::DbError(format!("insert entry failed: {e}")))?;
    Ok(())
}

pub fn update_label(conn: &Connection, key: &str, label: &str) -> Result<bool, AppError> {
    let changed = conn
        .execute(
            "update entries set label = ? where key = ? and label <> ?",
            params![label, key, label],
        )
        .map_err(|e| AppError::DbError(format!("update label failed: {e}")))?;
    Ok(changed > 0)
}

pub fn activate_entry(
    conn: &Connection,
    key: &str,
    start: DateTime<FixedOffset>,
    declared_end: Option<DateTime<FixedOffset>>,
) -> Result<(), AppError> {
    conn.execute(
        "update entries set is_active = 1, current_period_start = ?, current_period_end = ? where key = ?",
        params![start, declared_end, key],
    )
    .map_err(|e| AppError::DbError(format!("activate entry failed: {e}")))?;
    Ok(())
}

pub fn deactivate_entry(
    conn: &Connection,
    key: &str,
    end: DateTime<FixedOffset>,
) -> Result<(), AppError> {
    conn.execute(
        "update entries set is_active = 0, current_period_end = ? where key = ?",
        params![end, key],
    )
    .map_err(|e| AppError::DbError(format!("deactivate entry failed: {e}")))?;
    Ok(())
}

/// Open a new period unless one is already open. Returns whether a row was inserted.
pub fn open_period(
    conn: &Connection,
    key: &str,
    start: DateTime<FixedOffset>,
) -> Result<bool, AppError> {
    if count_open_periods(conn, key)? > 0 {
        return Ok(false);
    }
    conn.execute(
        "insert into entry_periods (entry_key, started_at) values (?, ?)",
        params![key, start],
    )
    .map_err(|e| AppError::DbError(format!("open period failed: {e}")))?;
    Ok(true)
}

/// Close the open period of `key`, returning its start. `None` when nothing was open.
pub fn close_open_period(
    conn: &Connection,
    key: &str,
    end: DateTime<FixedOffset>,
) -> Result<Option<DateTime<FixedOffset>>, AppError> {
    let open: Option<(i64, DateTime<FixedOffset>)> = conn
        .query_row(
            "select id, started_at from entry_periods where entry_key = ? and ended_at is null",
            params![key],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(|e| AppError::DbError(format!("find open period failed: {e}")))?;

    let Some((id, start)) = open else {
        return Ok(None);
    };

    conn.execute(
        "update entry_periods set ended_at = ? where id = ?",
        params![end, id],
    )
    .map_err(|e| AppError::DbError(format!("close period failed: {e}")))?;

    Ok(Some(start))
}

pub fn count_open_periods(conn: &Connection, key: &str) -> Result<i64, AppError> {
    conn.query_row(
        "select count(*) from entry_periods where entry_key = ? and ended_at is null",
        params![key],
        |r| r.get(0),
    )
    .map_err(|e| AppError::DbError(format!("count open periods failed: {e}")))
}

fn query_entries(conn: &Connection, sql: &str) -> Result<Vec<Entry>, AppError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| AppError::DbError(e.to_string()))?;
    let rows = stmt
        .query_map([], entry_from_row)
        .map_err(|e| AppError::DbError(e.to_string()))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| AppError::DbError(e.to_string()))?);
    }
    Ok(out)
}

pub fn active_entries(conn: &Connection) -> Result<Vec<Entry>, AppError> {
    query_entries(
        conn,
        &format!("select {ENTRY_COLUMNS} from entries where is_active = 1 order by current_period_start, key"),
    )
}

pub fn all_entries(conn: &Connection) -> Result<Vec<Entry>, AppError> {
    query_entries(conn, &format!("select {ENTRY_COLUMNS} from entries order by key"))
}

pub fn periods_for(conn: &Connection, key: &str) -> Result<Vec<EntryPeriod>, AppError> {
    let mut stmt = conn
        .prepare(
            "select id, entry_key, started_at, ended_at from entry_periods
             where entry_key = ? order by id",
        )
        .map_err(|e| AppError::DbError(e.to_string()))?;
    let rows = stmt
        .query_map(params![key], period_from_row)
        .map_err(|e| AppError::DbError(e.to_string()))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| AppError::DbError(e.to_string()))?);
    }
    Ok(out)
}

pub fn all_periods(conn: &Connection) -> Result<Vec<EntryPeriod>, AppError> {
    let mut stmt = conn
        .prepare("select id, entry_key, started_at, ended_at from entry_periods order by id")
        .map_err(|e| AppError::DbError(e.to_string()))?;
    let rows = stmt
        .query_map([], period_from_row)
        .map_err(|e| AppError::DbError(e.to_string()))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| AppError::DbError(e.to_string()))?);
    }
    Ok(out)
}
