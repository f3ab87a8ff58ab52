// src/db/recipients.rs
use chrono::{DateTime, FixedOffset};
use rusqlite::{params, Connection};

use crate::errors::AppError;

/// Register an individual user. Re-registering refreshes the username.
/// Returns false when the user was already known under the same username.
pub fn register_user(
    conn: &Connection,
    telegram_id: i64,
    username: Option<&str>,
    now: DateTime<FixedOffset>,
) -> Result<bool, AppError> {
    let changed = conn
        .execute(
            "insert into users (telegram_id, username, created_at) values (?, ?, ?)
             on conflict(telegram_id) do update set username = excluded.username
             where users.username is not excluded.username",
            params![telegram_id, username, now],
        )
        .map_err(|e| AppError::DbError(format!("insert user failed: {e}")))?;
    Ok(changed > 0)
}

/// Register a group or channel the bot was added to. Returns false when it was already known.
pub fn register_chat(
    conn: &Connection,
    chat_id: i64,
    chat_type: &str,
    title: Option<&str>,
    username: Option<&str>,
    now: DateTime<FixedOffset>,
) -> Result<bool, AppError> {
    let inserted = conn
        .execute(
            "insert or ignore into chats (chat_id, chat_type, title, username, created_at)
             values (?, ?, ?, ?, ?)",
            params![chat_id, chat_type, title, username, now],
        )
        .map_err(|e| AppError::DbError(format!("insert chat failed: {e}")))?;
    Ok(inserted > 0)
}

/// Forget a group or channel the bot left or was kicked from.
pub fn remove_chat(conn: &Connection, chat_id: i64) -> Result<bool, AppError> {
    let removed = conn
        .execute("delete from chats where chat_id = ?", params![chat_id])
        .map_err(|e| AppError::DbError(format!("delete chat failed: {e}")))?;
    Ok(removed > 0)
}

/// Every destination a notification fans out to: users and chats, de-duplicated.
pub fn list_destinations(conn: &Connection) -> Result<Vec<i64>, AppError> {
    let mut stmt = conn
        .prepare(
            "select telegram_id from users
             union
             select chat_id from chats
             order by 1",
        )
        .map_err(|e| AppError::DbError(e.to_string()))?;

    let rows = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(|e| AppError::DbError(e.to_string()))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r.map_err(|e| AppError::DbError(e.to_string()))?);
    }
    Ok(out)
}
