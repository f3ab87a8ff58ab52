// src/domain/transition.rs

use chrono::{DateTime, FixedOffset};
use std::fmt;

use super::entry::elapsed_days;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The feed edited the declared dates of a key that was already active.
    DateChanged,
    /// The declared end date passed while the key was still in the feed.
    Expired,
    /// The key is no longer in the effective snapshot.
    Vanished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Created,
    Reactivated,
    Closed(CloseReason),
}

/// A classified state change for one entry in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub key: String,
    pub label: String,
    pub kind: TransitionKind,
    pub period_start: Option<DateTime<FixedOffset>>,
    pub period_end: Option<DateTime<FixedOffset>>,
}

impl Transition {
    pub fn opened(
        key: &str,
        label: &str,
        kind: TransitionKind,
        start: DateTime<FixedOffset>,
    ) -> Self {
        Transition {
            key: key.to_string(),
            label: label.to_string(),
            kind,
            period_start: Some(start),
            period_end: None,
        }
    }

    pub fn closed(
        key: &str,
        label: &str,
        reason: CloseReason,
        start: Option<DateTime<FixedOffset>>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        Transition {
            key: key.to_string(),
            label: label.to_string(),
            kind: TransitionKind::Closed(reason),
            period_start: start,
            period_end: Some(end),
        }
    }

    pub fn is_closure(&self) -> bool {
        matches!(self.kind, TransitionKind::Closed(_))
    }

    /// Elapsed whole days of the closed period, `None` when the start is unknown.
    pub fn days_active(&self) -> Option<i64> {
        match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => Some(elapsed_days(start, end)),
            _ => None,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::DateChanged => write!(f, "dates changed"),
            CloseReason::Expired => write!(f, "expired"),
            CloseReason::Vanished => write!(f, "removed from feed"),
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::Created => write!(f, "created"),
            TransitionKind::Reactivated => write!(f, "reactivated"),
            TransitionKind::Closed(reason) => write!(f, "closed ({reason})"),
        }
    }
}
