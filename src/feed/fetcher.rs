// fetcher.rs
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::models::{FeedPayload, RawServer};
use super::{FeedError, FeedSource, Fetched};
use crate::domain::{FeedRecord, Snapshot};

const USER_AGENT: &str = concat!("server_watch/", env!("CARGO_PKG_VERSION"));
const FEED_DATE_FORMAT: &str = "%d/%m/%Y";
const DEFAULT_LABEL: &str = "New server";

pub struct FeedFetcher {
    client: Client,
    url: String,
    offset: FixedOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    StartOfDay,
    EndOfDay,
}

impl FeedFetcher {
    pub fn new(url: &str, timeout: Duration, offset: FixedOffset) -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Network(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            offset,
        })
    }

    /// Read and normalize the feed, or explain why it could not be read.
    pub fn try_fetch(&self) -> Result<Snapshot, FeedError> {
        let resp = self
            .client
            .get(self.cache_busted_url())
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .map_err(|e| FeedError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = resp.text().map_err(|e| FeedError::Network(e.to_string()))?;
        let records = parse_feed(&body, self.offset)?;
        Ok(Snapshot::new(records))
    }

    fn cache_busted_url(&self) -> String {
        let bust: u64 = rand::thread_rng().gen();
        match url::Url::parse(&self.url) {
            Ok(mut url) => {
                url.query_pairs_mut().append_pair("_", &bust.to_string());
                url.to_string()
            }
            Err(_) => self.url.clone(),
        }
    }
}

impl FeedSource for FeedFetcher {
    fn fetch(&self, now: DateTime<FixedOffset>) -> Fetched {
        let raw = match self.try_fetch() {
            Ok(snapshot) => {
                if snapshot.is_empty() {
                    info!(url = %self.url, "feed lists no servers");
                }
                snapshot
            }
            Err(e) => {
                warn!(error = %e, url = %self.url, "feed fetch failed, using empty snapshot");
                Snapshot::failed()
            }
        };
        Fetched::from_raw(raw, now)
    }
}

/// Decode the feed body into validated records, in feed order.
/// Records without an `ip` are dropped; repeated keys keep their first occurrence.
pub fn parse_feed(body: &str, offset: FixedOffset) -> Result<Vec<FeedRecord>, FeedError> {
    let payload: FeedPayload =
        serde_json::from_str(body).map_err(|e| FeedError::JsonParse(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(payload.servers.len());

    for value in payload.servers {
        let raw: RawServer = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "skipping malformed feed record");
                continue;
            }
        };

        let Some(key) = raw.ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty()) else {
            debug!("skipping feed record without ip");
            continue;
        };

        if !seen.insert(key.to_string()) {
            warn!(key, "duplicate key in feed, keeping first occurrence");
            continue;
        }

        let label = raw
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_LABEL);

        records.push(FeedRecord {
            key: key.to_string(),
            label: label.to_string(),
            declared_start: declared_date(key, "start", raw.start.as_deref(), offset, DateBound::StartOfDay),
            declared_end: declared_date(key, "end", raw.end.as_deref(), offset, DateBound::EndOfDay),
        });
    }

    Ok(records)
}

fn declared_date(
    key: &str,
    field: &str,
    value: Option<&str>,
    offset: FixedOffset,
    bound: DateBound,
) -> Option<DateTime<FixedOffset>> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    let parsed = parse_feed_date(value, offset, bound);
    if parsed.is_none() {
        warn!(key, field, value, "unparsable feed date, treating as absent");
    }
    parsed
}

/// Turn a `DD/MM/YYYY` calendar date into an instant in the feed's timezone.
pub fn parse_feed_date(
    value: &str,
    offset: FixedOffset,
    bound: DateBound,
) -> Option<DateTime<FixedOffset>> {
    let date = NaiveDate::parse_from_str(value, FEED_DATE_FORMAT).ok()?;
    let time = match bound {
        DateBound::StartOfDay => NaiveTime::from_hms_opt(0, 0, 0)?,
        DateBound::EndOfDay => NaiveTime::from_hms_opt(23, 59, 59)?,
    };
    offset.from_local_datetime(&date.and_time(time)).single()
}
