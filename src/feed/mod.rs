mod feed_error;
mod fetcher;
mod models;

pub use feed_error::FeedError;
pub use fetcher::FeedFetcher;

use chrono::{DateTime, FixedOffset};

use crate::domain::Snapshot;

/// Output of one fetch: the full feed and the subset that should be active now.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    pub raw: Snapshot,
    pub effective: Snapshot,
}

impl Fetched {
    pub fn from_raw(raw: Snapshot, now: DateTime<FixedOffset>) -> Self {
        let effective = raw.effective(now);
        Fetched { raw, effective }
    }
}

/// Anything that can produce the current feed. Implementations never fail;
/// an unreadable feed is reported as a failed empty snapshot.
pub trait FeedSource: Send {
    fn fetch(&self, now: DateTime<FixedOffset>) -> Fetched;
}
