use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::db::cycles::recent_cycles;
use crate::db::{entries, recipients, Database};
use crate::domain::{Entry, EntryPeriod};
use crate::errors::AppError;
use crate::responses::{json_response, ResultResp};
use astra::Request;

/// One row of the history listing.
#[derive(Debug, Serialize)]
pub struct HistoryRow {
    pub key: String,
    pub label: String,
    pub start: DateTime<FixedOffset>,
    pub end: Option<DateTime<FixedOffset>>,
    pub open: bool,
    pub days_active: Option<i64>,
}

#[derive(Debug, Serialize)]
struct EntryHistory {
    entry: Entry,
    periods: Vec<HistoryRow>,
}

#[derive(Debug, Serialize)]
struct Registered {
    id: i64,
    changed: bool,
}

pub fn handle(req: Request, db: &Database) -> ResultResp {
    let method = req.method().as_str();
    let path = req.uri().path();

    match (method, path) {
        ("GET", "/active") => {
            let active = db.with_conn(|conn| entries::active_entries(conn))?;
            json_response(200, &active)
        }
        ("GET", "/history") => {
            let rows = db.with_conn(|conn| {
                let labels: HashMap<String, String> = entries::all_entries(conn)?
                    .into_iter()
                    .map(|e| (e.key, e.label))
                    .collect();
                let periods = entries::all_periods(conn)?;
                Ok(periods
                    .into_iter()
                    .map(|period| {
                        let label = labels.get(&period.entry_key).cloned().unwrap_or_default();
                        history_row(period, label)
                    })
                    .collect::<Vec<_>>())
            })?;
            json_response(200, &rows)
        }
        ("GET", p) if p.starts_with("/history/") => {
            let key = &p["/history/".len()..];
            if key.is_empty() {
                return Err(AppError::NotFound);
            }
            let history = db.with_conn(|conn| {
                let entry = entries::find_entry(conn, key)?.ok_or(AppError::NotFound)?;
                let periods = entries::periods_for(conn, key)?
                    .into_iter()
                    .map(|period| history_row(period, entry.label.clone()))
                    .collect();
                Ok(EntryHistory { entry, periods })
            })?;
            json_response(200, &history)
        }
        ("GET", "/cycles") => {
            let runs = db.with_conn(|conn| recent_cycles(conn))?;
            json_response(200, &runs)
        }
        ("POST", "/users") => {
            let params = parse_query(&req);
            let id = required_id(&params)?;
            let username = params.get("username").map(String::as_str);
            let changed =
                db.with_conn(|conn| recipients::register_user(conn, id, username, now()))?;
            json_response(200, &Registered { id, changed })
        }
        ("POST", "/chats") => {
            let params = parse_query(&req);
            let id = required_id(&params)?;
            let chat_type = params.get("type").map(String::as_str).unwrap_or("group");
            let title = params.get("title").map(String::as_str);
            let username = params.get("username").map(String::as_str);
            let changed = db.with_conn(|conn| {
                recipients::register_chat(conn, id, chat_type, title, username, now())
            })?;
            json_response(200, &Registered { id, changed })
        }
        ("POST", "/chats/remove") => {
            let params = parse_query(&req);
            let id = required_id(&params)?;
            let changed = db.with_conn(|conn| recipients::remove_chat(conn, id))?;
            json_response(200, &Registered { id, changed })
        }
        _ => Err(AppError::NotFound),
    }
}

fn history_row(period: EntryPeriod, label: String) -> HistoryRow {
    HistoryRow {
        open: period.is_open(),
        days_active: period.days_active(),
        key: period.entry_key,
        label,
        start: period.start,
        end: period.end,
    }
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&Utc.fix())
}

fn required_id(params: &HashMap<String, String>) -> Result<i64, AppError> {
    let raw = params
        .get("id")
        .ok_or_else(|| AppError::BadRequest("missing id".into()))?;
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id: {raw}")))
}

fn parse_query(req: &Request) -> HashMap<String, String> {
    req.uri()
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}
