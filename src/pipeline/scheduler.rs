// src/pipeline/scheduler.rs

//! Fixed-interval driver of the watch cycle.
//!
//! One cycle runs at a time. A cycle that overruns its slot delays the
//! next trigger instead of stacking triggers up.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::pipeline::cycle::{CycleReport, CycleStatus, Watcher};
use crate::pipeline::watermark::CycleKind;
use crate::utils::log as report_log;

/// Totals over a scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    pub cycles: usize,
    pub blocked: usize,
    pub fetch_failures: usize,
    /// Cycles aborted by a store error
    pub store_failures: usize,
    pub notified: usize,
}

impl SchedulerReport {
    fn record(&mut self, outcome: &crate::error::Result<CycleReport>) {
        self.cycles += 1;
        match outcome {
            Ok(report) => {
                self.notified += report.notified;
                match report.status {
                    CycleStatus::Completed => {}
                    CycleStatus::Blocked => self.blocked += 1,
                    CycleStatus::FetchFailed(_) => self.fetch_failures += 1,
                }
            }
            Err(_) => self.store_failures += 1,
        }
    }
}

/// Periodic trigger for [`Watcher::run_cycle`].
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    max_cycles: Option<usize>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_cycles: None,
        }
    }

    /// Stop after `cycles` cycles.
    pub fn with_max_cycles(mut self, cycles: usize) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Run cycles until `shutdown` resolves or the cycle limit is reached.
    ///
    /// The first cycle fires immediately with the start-of-day watermark.
    /// No cycle error ends the loop. On shutdown an in-flight cycle is
    /// dropped, which tears its browser session down.
    pub async fn run<F>(&self, watcher: &Watcher, shutdown: F) -> SchedulerReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut kind = CycleKind::Initial;
        let mut totals = SchedulerReport::default();

        loop {
            if self.max_cycles.is_some_and(|max| totals.cycles >= max) {
                log::info!("Reached {} cycles, stopping", totals.cycles);
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => {
                    log::info!("Shutdown requested");
                    break;
                }
            }

            let outcome = tokio::select! {
                outcome = watcher.run_cycle(kind) => outcome,
                _ = &mut shutdown => {
                    log::warn!("Shutdown requested during a cycle, abandoning it");
                    break;
                }
            };

            log_outcome(totals.cycles + 1, &outcome);
            totals.record(&outcome);
            kind = CycleKind::Periodic;
        }

        totals
    }
}

fn log_outcome(number: usize, outcome: &crate::error::Result<CycleReport>) {
    match outcome {
        Ok(report) => report_log::summary(
            &format!("Cycle {number} ({:?})", report.kind),
            &[
                ("Status", format!("{:?}", report.status)),
                ("Candidates", report.candidates.to_string()),
                ("New", report.new.to_string()),
                ("Notified", report.notified.to_string()),
                ("Delivery failures", report.delivery_failures.to_string()),
                ("Store failures", report.store_failures.to_string()),
                (
                    "Duration",
                    format!(
                        "{}ms",
                        (report.finished_at - report.started_at).num_milliseconds()
                    ),
                ),
            ],
        ),
        Err(e) => log::error!("Cycle {} aborted: {}", number, e),
    }
}
