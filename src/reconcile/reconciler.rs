// src/reconcile/reconciler.rs

use chrono::{DateTime, FixedOffset};
use rusqlite::Transaction;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::db::entries;
use crate::db::Database;
use crate::domain::{CloseReason, PreviousCycleState, Snapshot, Transition, TransitionKind};
use crate::errors::AppError;

/// What to do with active entries when the feed could not be read at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VanishPolicy {
    /// Skip disappearance closure and keep the previous-cycle state.
    #[default]
    SkipOnFetchFailure,
    /// Treat the failed fetch as a feed that lists nothing.
    TreatAsEmpty,
}

/// The step-groups of one cycle, in the order they run. Each commits on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    DateChange,
    Expiry,
    Activation,
    Disappearance,
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Committed transitions, in emission order.
    pub transitions: Vec<Transition>,
    /// State to hand to the next cycle.
    pub previous: PreviousCycleState,
    /// Step-groups that were rolled back this cycle.
    pub failed_steps: Vec<Step>,
    /// Disappearance closure was skipped because the fetch failed.
    pub vanish_skipped: bool,
}

impl ReconcileOutcome {
    pub fn rolled_back(&self, step: Step) -> bool {
        self.failed_steps.contains(&step)
    }
}

pub struct Reconciler {
    db: Database,
    policy: VanishPolicy,
}

impl Reconciler {
    pub fn new(db: Database, policy: VanishPolicy) -> Self {
        Self { db, policy }
    }

    /// Diff one fetched feed against the store and the previous cycle, apply
    /// the resulting mutations, and report what changed.
    ///
    /// Steps run in a fixed order and each sees the writes of the ones before:
    /// a date edit closes the old period before expiry is considered, and the
    /// activation step may reopen the same key in the same cycle. A step that
    /// fails is rolled back on its own and its transitions are dropped; the
    /// next cycle derives them again from the store and the feed. Keys closed
    /// by a date edit stay marked until a committed activation reopens them,
    /// so the reopening is announced even when it lands a cycle later.
    pub fn reconcile(
        &self,
        previous: &PreviousCycleState,
        raw: &Snapshot,
        effective: &Snapshot,
        now: DateTime<FixedOffset>,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        let date_changed = self.run_step(Step::DateChange, &mut outcome, |tx| {
            close_changed_dates(tx, previous, raw, now)
        });
        let closed_for_dates: HashSet<String> = date_changed.into_iter().collect();

        self.run_step(Step::Expiry, &mut outcome, |tx| close_expired(tx, raw, now));

        self.run_step(Step::Activation, &mut outcome, |tx| {
            activate(tx, previous, effective, &closed_for_dates, now)
        });

        outcome.vanish_skipped =
            raw.fetch_failed() && self.policy == VanishPolicy::SkipOnFetchFailure;
        if outcome.vanish_skipped {
            warn!("feed unavailable, skipping disappearance closure");
        } else {
            self.run_step(Step::Disappearance, &mut outcome, |tx| {
                close_vanished(tx, effective, now)
            });
        }

        // A skipped feed carries nothing new to compare against.
        outcome.previous = if outcome.vanish_skipped {
            previous.clone()
        } else {
            previous.advance(
                raw,
                effective,
                !outcome.rolled_back(Step::DateChange),
                !outcome.rolled_back(Step::Activation),
                &closed_for_dates,
            )
        };

        outcome
    }

    /// Run one step-group in its own transaction. Returns the keys it touched.
    fn run_step<F>(&self, step: Step, outcome: &mut ReconcileOutcome, f: F) -> Vec<String>
    where
        F: FnOnce(&Transaction) -> Result<Vec<Transition>, AppError>,
    {
        let result = self.db.with_conn(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| AppError::DbError(format!("begin transaction failed: {e}")))?;
            let transitions = f(&tx)?;
            tx.commit()
                .map_err(|e| AppError::DbError(format!("commit failed: {e}")))?;
            Ok(transitions)
        });

        match result {
            Ok(transitions) => {
                let keys = transitions.iter().map(|t| t.key.clone()).collect();
                for t in &transitions {
                    debug!(key = %t.key, kind = %t.kind, ?step, "transition");
                }
                outcome.transitions.extend(transitions);
                keys
            }
            Err(e) => {
                warn!(?step, error = %e, "step rolled back, will retry next cycle");
                outcome.failed_steps.push(step);
                Vec::new()
            }
        }
    }
}

/// Step 1: a known key whose declared dates moved ends its current period.
fn close_changed_dates(
    tx: &Transaction,
    previous: &PreviousCycleState,
    raw: &Snapshot,
    now: DateTime<FixedOffset>,
) -> Result<Vec<Transition>, AppError> {
    let mut out = Vec::new();

    for record in raw.records() {
        let Some(before) = previous.declared(&record.key) else {
            continue;
        };
        if *before == record.declared_dates() {
            continue;
        }

        let Some(entry) = entries::find_entry(tx, &record.key)? else {
            continue;
        };
        if !entry.is_active {
            continue;
        }

        let start = entries::close_open_period(tx, &entry.key, now)?;
        entries::deactivate_entry(tx, &entry.key, now)?;
        out.push(Transition::closed(
            &entry.key,
            &entry.label,
            CloseReason::DateChanged,
            start,
            now,
        ));
    }

    Ok(out)
}

/// Step 2: records still listed but past their declared end.
fn close_expired(
    tx: &Transaction,
    raw: &Snapshot,
    now: DateTime<FixedOffset>,
) -> Result<Vec<Transition>, AppError> {
    let mut out = Vec::new();

    for record in raw.records() {
        let Some(end) = record.declared_end.filter(|end| *end < now) else {
            continue;
        };

        let Some(entry) = entries::find_entry(tx, &record.key)? else {
            continue;
        };
        if !entry.is_active {
            continue;
        }

        let start = entries::close_open_period(tx, &entry.key, end)?;
        entries::deactivate_entry(tx, &entry.key, end)?;
        out.push(Transition::closed(
            &entry.key,
            &entry.label,
            CloseReason::Expired,
            start,
            end,
        ));
    }

    Ok(out)
}

/// Step 3: create unseen keys and reopen inactive ones.
fn activate(
    tx: &Transaction,
    previous: &PreviousCycleState,
    effective: &Snapshot,
    closed_for_dates: &HashSet<String>,
    now: DateTime<FixedOffset>,
) -> Result<Vec<Transition>, AppError> {
    let mut out = Vec::new();
    let mut created: HashSet<&str> = HashSet::new();

    for record in effective.records() {
        let start = record.period_start(now);

        match entries::find_entry(tx, &record.key)? {
            None => {
                entries::insert_entry(tx, &record.key, &record.label, start, record.declared_end, now)?;
                entries::open_period(tx, &record.key, start)?;
                created.insert(record.key.as_str());
                out.push(Transition::opened(
                    &record.key,
                    &record.label,
                    TransitionKind::Created,
                    start,
                ));
            }
            Some(entry) if !entry.is_active => {
                entries::update_label(tx, &record.key, &record.label)?;
                entries::activate_entry(tx, &record.key, start, record.declared_end)?;
                entries::open_period(tx, &record.key, start)?;

                let fresh = !previous.was_active(&record.key)
                    || closed_for_dates.contains(&record.key)
                    || previous.awaiting_reopen(&record.key);
                if fresh && !created.contains(record.key.as_str()) {
                    out.push(Transition::opened(
                        &record.key,
                        &record.label,
                        TransitionKind::Reactivated,
                        start,
                    ));
                } else {
                    debug!(
                        key = %record.key,
                        listed_before = previous.listed(&record.key),
                        "reactivated without notification"
                    );
                }
            }
            Some(entry) => {
                entries::update_label(tx, &record.key, &record.label)?;
                let repair_start = entry.current_period_start.unwrap_or(start);
                if entries::open_period(tx, &record.key, repair_start)? {
                    warn!(key = %record.key, "active entry had no open period, reopened");
                }
            }
        }
    }

    Ok(out)
}

/// Step 4: active entries that are no longer in the effective feed.
fn close_vanished(
    tx: &Transaction,
    effective: &Snapshot,
    now: DateTime<FixedOffset>,
) -> Result<Vec<Transition>, AppError> {
    let listed = effective.keys();
    let mut out = Vec::new();

    for entry in entries::active_entries(tx)? {
        if listed.contains(entry.key.as_str()) {
            continue;
        }

        let start = entries::close_open_period(tx, &entry.key, now)?;
        entries::deactivate_entry(tx, &entry.key, now)?;
        out.push(Transition::closed(
            &entry.key,
            &entry.label,
            CloseReason::Vanished,
            start,
            now,
        ));
    }

    Ok(out)
}
