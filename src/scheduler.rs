// src/scheduler.rs

use chrono::{DateTime, FixedOffset, Utc};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::db::cycles::{end_cycle_run, start_cycle_run, CycleSummary};
use crate::db::Database;
use crate::domain::PreviousCycleState;
use crate::feed::FeedSource;
use crate::notify::Notifier;
use crate::reconcile::Reconciler;

/// Stops the loop at its next sleep. Dropping the handle has the same effect.
pub struct ShutdownHandle(Sender<()>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.0.send(());
    }
}

pub struct Scheduler {
    feed: Box<dyn FeedSource>,
    reconciler: Reconciler,
    notifier: Notifier,
    db: Database,
    interval: Duration,
    offset: FixedOffset,
}

impl Scheduler {
    pub fn new(
        feed: Box<dyn FeedSource>,
        reconciler: Reconciler,
        notifier: Notifier,
        db: Database,
        interval: Duration,
        offset: FixedOffset,
    ) -> Self {
        Self {
            feed,
            reconciler,
            notifier,
            db,
            interval,
            offset,
        }
    }

    /// Run the loop on its own thread.
    pub fn spawn(self) -> std::io::Result<(JoinHandle<()>, ShutdownHandle)> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("reconcile".into())
            .spawn(move || self.run(rx))?;
        Ok((handle, ShutdownHandle(tx)))
    }

    /// Cycle, sleep, repeat until shut down. Cycles never overlap.
    pub fn run(&self, shutdown: Receiver<()>) {
        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        let mut previous = PreviousCycleState::default();

        loop {
            previous = self.run_cycle_guarded(previous);

            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!(
            delivery_failures = self.notifier.delivery_failures(),
            "scheduler stopped"
        );
    }

    /// A panicking cycle is logged and the previous state is kept.
    pub fn run_cycle_guarded(&self, previous: PreviousCycleState) -> PreviousCycleState {
        let fallback = previous.clone();
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle(previous))) {
            Ok(next) => next,
            Err(_) => {
                error!("reconcile cycle panicked, continuing after the normal delay");
                fallback
            }
        }
    }

    /// One fetch → reconcile → notify pass.
    pub fn run_cycle(&self, previous: PreviousCycleState) -> PreviousCycleState {
        let now = self.now();

        let run_id = match self.db.with_conn(|conn| start_cycle_run(conn, now)) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "could not record cycle start");
                None
            }
        };

        let fetched = self.feed.fetch(now);
        let outcome = self
            .reconciler
            .reconcile(&previous, &fetched.raw, &fetched.effective, now);

        // Only committed transitions reach the notifier.
        let report = self.notifier.notify(&outcome.transitions);

        let summary = CycleSummary {
            records_seen: fetched.raw.len(),
            fetch_failed: fetched.raw.fetch_failed(),
            transitions: outcome.transitions.len(),
            delivery_failures: report.failed,
            error: (!outcome.failed_steps.is_empty())
                .then(|| format!("rolled back: {:?}", outcome.failed_steps)),
        };

        info!(
            records = summary.records_seen,
            effective = fetched.effective.len(),
            fetch_failed = summary.fetch_failed,
            transitions = summary.transitions,
            closed = outcome.transitions.iter().filter(|t| t.is_closure()).count(),
            delivered = report.delivered,
            delivery_failures = report.failed,
            "cycle complete"
        );

        if let Some(id) = run_id {
            let finished = self.now();
            if let Err(e) = self
                .db
                .with_conn(|conn| end_cycle_run(conn, id, finished, &summary))
            {
                warn!(error = %e, "could not record cycle end");
            }
        }

        outcome.previous
    }

    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}
