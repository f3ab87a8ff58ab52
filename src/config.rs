// src/config.rs

use chrono::FixedOffset;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

use crate::reconcile::VanishPolicy;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feed_url: String,
    pub database_path: String,
    pub check_interval: Duration,
    pub fetch_timeout: Duration,
    pub delivery_timeout: Duration,
    pub delivery_workers: usize,
    pub feed_offset: FixedOffset,
    pub vanish_policy: VanishPolicy,
    pub telegram_bot_token: Option<String>,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let feed_url = var(vars, "FEED_URL").ok_or(ConfigError::Missing("FEED_URL"))?;
        url::Url::parse(feed_url).map_err(|_| ConfigError::Invalid {
            name: "FEED_URL",
            value: feed_url.to_string(),
        })?;

        let offset_hours: i32 = parse_or(vars, "FEED_UTC_OFFSET_HOURS", 3)?;
        let feed_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::Invalid {
                name: "FEED_UTC_OFFSET_HOURS",
                value: offset_hours.to_string(),
            })?;

        let delivery_workers: usize = parse_or(vars, "DELIVERY_WORKERS", 4)?;
        if delivery_workers == 0 {
            return Err(ConfigError::Invalid {
                name: "DELIVERY_WORKERS",
                value: "0".into(),
            });
        }

        let check_interval_secs: u64 = parse_or(vars, "CHECK_INTERVAL_SECS", 60)?;
        if check_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "CHECK_INTERVAL_SECS",
                value: "0".into(),
            });
        }

        let vanish_policy = if parse_or(vars, "VANISH_ON_FETCH_FAILURE", false)? {
            VanishPolicy::TreatAsEmpty
        } else {
            VanishPolicy::SkipOnFetchFailure
        };

        Ok(AppConfig {
            feed_url: feed_url.to_string(),
            database_path: var(vars, "DATABASE_PATH")
                .unwrap_or("server_watch.sqlite3")
                .to_string(),
            check_interval: Duration::from_secs(check_interval_secs),
            fetch_timeout: Duration::from_secs(parse_or(vars, "FETCH_TIMEOUT_SECS", 10)?),
            delivery_timeout: Duration::from_secs(parse_or(vars, "DELIVERY_TIMEOUT_SECS", 10)?),
            delivery_workers,
            feed_offset,
            vanish_policy,
            telegram_bot_token: var(vars, "TELEGRAM_BOT_TOKEN").map(str::to_string),
            bind_addr: parse_or(vars, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
        })
    }
}

fn var<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(vars, name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            value: raw.to_string(),
        }),
    }
}
