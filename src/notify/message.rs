// src/notify/message.rs

use chrono::{DateTime, FixedOffset};

use crate::domain::{CloseReason, Transition, TransitionKind};

const DATE_FORMAT: &str = "%d.%m.%Y";

fn date(ts: Option<DateTime<FixedOffset>>) -> String {
    ts.map(|t| t.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Plain-text notification for one transition.
pub fn format_transition(t: &Transition) -> String {
    match t.kind {
        TransitionKind::Created => format!(
            "✅ New server advertised\n\nIP: {}\nName: {}\nSince: {}",
            t.key,
            t.label,
            date(t.period_start)
        ),
        TransitionKind::Reactivated => format!(
            "🔁 Server advertised again\n\nIP: {}\nName: {}\nSince: {}",
            t.key,
            t.label,
            date(t.period_start)
        ),
        TransitionKind::Closed(reason) => {
            let headline = match reason {
                CloseReason::DateChanged => "✏️ Server advertisement dates changed",
                CloseReason::Expired => "⌛ Server advertisement expired",
                CloseReason::Vanished => "❌ Server removed",
            };
            let days = t
                .days_active()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "?".to_string());
            format!(
                "{headline}\n\nIP: {}\nName: {}\nAdvertised for: {days} days\nEnded: {}",
                t.key,
                t.label,
                date(t.period_end)
            )
        }
    }
}
