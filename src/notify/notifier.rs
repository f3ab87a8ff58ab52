// src/notify/notifier.rs

use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use tracing::warn;

use super::message::format_transition;
use super::transport::Transport;
use crate::db::{recipients, Database};
use crate::domain::Transition;
use crate::errors::AppError;

/// Where notifications go.
pub trait RecipientDirectory: Send + Sync {
    fn list_destinations(&self) -> Result<Vec<i64>, AppError>;
}

impl RecipientDirectory for Database {
    fn list_destinations(&self) -> Result<Vec<i64>, AppError> {
        self.with_conn(|conn| recipients::list_destinations(conn))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

impl AddAssign for DeliveryReport {
    fn add_assign(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

pub struct Notifier {
    directory: Box<dyn RecipientDirectory>,
    transport: Box<dyn Transport>,
    workers: usize,
    delivery_failures: AtomicU64,
}

impl Notifier {
    pub fn new(
        directory: Box<dyn RecipientDirectory>,
        transport: Box<dyn Transport>,
        workers: usize,
    ) -> Self {
        Self {
            directory,
            transport,
            workers: workers.max(1),
            delivery_failures: AtomicU64::new(0),
        }
    }

    /// Failed deliveries since startup.
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    /// Send one message per transition to every destination, in order.
    /// Individual failures are logged and counted, never propagated.
    pub fn notify(&self, transitions: &[Transition]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        if transitions.is_empty() {
            return report;
        }

        let destinations = match self.directory.list_destinations() {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, pending = transitions.len(), "could not load destinations");
                report.failed = transitions.len();
                self.record_failures(report.failed);
                return report;
            }
        };

        for transition in transitions {
            let text = format_transition(transition);
            report += self.fan_out(&destinations, &text);
        }

        self.record_failures(report.failed);
        report
    }

    fn record_failures(&self, n: usize) {
        if n > 0 {
            self.delivery_failures.fetch_add(n as u64, Ordering::Relaxed);
        }
    }

    fn fan_out(&self, destinations: &[i64], text: &str) -> DeliveryReport {
        if destinations.is_empty() {
            return DeliveryReport::default();
        }

        let chunk_size = destinations.len().div_ceil(self.workers);
        thread::scope(|s| {
            let handles: Vec<_> = destinations
                .chunks(chunk_size)
                .map(|chunk| (chunk.len(), s.spawn(move || self.deliver_chunk(chunk, text))))
                .collect();

            let mut report = DeliveryReport::default();
            for (len, handle) in handles {
                match handle.join() {
                    Ok(r) => report += r,
                    Err(_) => {
                        warn!(recipients = len, "delivery worker panicked");
                        report.failed += len;
                    }
                }
            }
            report
        })
    }

    fn deliver_chunk(&self, destinations: &[i64], text: &str) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for &destination in destinations {
            match self.transport.send(destination, text) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(destination, error = %e, "delivery failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
