// src/pipeline/cycle.rs

//! One watch cycle: fetch, extract, dedup, persist and notify.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::models::{DeliveryPolicy, ListingRecord};
use crate::pipeline::dedup::DedupFilter;
use crate::pipeline::watermark::{CycleKind, format_watermark, watermark};
use crate::services::{FetchClient, ListingExtractor, Notifier, PageResult};
use crate::storage::{ArtifactWriter, RecordStore};

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    /// Page processed
    Completed,
    /// Source rejected the session; nothing was processed
    Blocked,
    /// Fetch failed; nothing was processed
    FetchFailed(String),
}

/// Counters for one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub kind: CycleKind,
    pub watermark: i64,
    pub status: CycleStatus,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Records extracted from the page
    pub candidates: usize,
    /// Candidates already in the store
    pub seen: usize,
    /// Candidates classified as new
    pub new: usize,
    /// New records written to the store
    pub persisted: usize,
    /// Notifications accepted by the channel
    pub notified: usize,
    /// Notifications the channel failed to take
    pub delivery_failures: usize,
    /// New records the store failed to write
    pub store_failures: usize,
}

impl CycleReport {
    fn begin(kind: CycleKind, watermark: i64, started_at: DateTime<Local>) -> Self {
        Self {
            kind,
            watermark,
            status: CycleStatus::Completed,
            started_at,
            finished_at: started_at,
            candidates: 0,
            seen: 0,
            new: 0,
            persisted: 0,
            notified: 0,
            delivery_failures: 0,
            store_failures: 0,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Local::now();
        self
    }
}

/// The watch pipeline, wired to its collaborators.
pub struct Watcher {
    fetch: FetchClient,
    extractor: ListingExtractor,
    dedup: DedupFilter,
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
    artifacts: Option<ArtifactWriter>,
    interval: Duration,
    policy: DeliveryPolicy,
}

impl Watcher {
    pub fn new(
        fetch: FetchClient,
        extractor: ListingExtractor,
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            fetch,
            extractor,
            dedup: DedupFilter::new(),
            store,
            notifier,
            artifacts: None,
            interval,
            policy: DeliveryPolicy::default(),
        }
    }

    /// Dump each cycle's candidates under `writer`.
    pub fn with_artifacts(mut self, writer: ArtifactWriter) -> Self {
        self.artifacts = Some(writer);
        self
    }

    pub fn with_policy(mut self, policy: DeliveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Run one cycle now.
    pub async fn run_cycle(&self, kind: CycleKind) -> Result<CycleReport> {
        self.run_cycle_at(kind, Local::now()).await
    }

    /// Run one cycle as if started at `now`.
    ///
    /// Blocked and failed fetches are reported in the returned status.
    /// `Err` means the store could not be read while classifying candidates.
    /// A failed write of one new record is counted and the batch continues.
    pub async fn run_cycle_at(&self, kind: CycleKind, now: DateTime<Local>) -> Result<CycleReport> {
        let watermark = watermark(kind, &now, self.interval);
        let mut report = CycleReport::begin(kind, watermark, now);

        log::info!(
            "Checking for new listings after... {}",
            format_watermark(watermark)
        );

        let markup = match self.fetch.fetch(watermark).await {
            PageResult::Content(markup) => markup,
            PageResult::Blocked => {
                log::warn!("Blocked! The source rejected this cycle's request");
                report.status = CycleStatus::Blocked;
                return Ok(report.finish());
            }
            PageResult::Error(e) => {
                log::error!("Fetch failed: {}", e);
                report.status = CycleStatus::FetchFailed(e.to_string());
                return Ok(report.finish());
            }
        };

        let candidates = self.extractor.extract(&markup);
        report.candidates = candidates.len();
        if let Some(writer) = &self.artifacts {
            writer.save_records(&candidates).await;
        }

        let partition = self
            .dedup
            .partition(self.store.as_ref(), candidates)
            .await?;
        report.seen = partition.seen.len();
        report.new = partition.new.len();
        log::info!(
            "{} candidates: {} new, {} already seen",
            report.candidates,
            report.new,
            report.seen
        );

        for record in &partition.new {
            self.dispatch(record, &mut report).await;
        }

        Ok(report.finish())
    }

    /// Persist and announce one new record according to the delivery policy.
    async fn dispatch(&self, record: &ListingRecord, report: &mut CycleReport) {
        match self.policy {
            DeliveryPolicy::PersistFirst => {
                match self.store.put(record).await {
                    Ok(true) => report.persisted += 1,
                    Ok(false) => return,
                    Err(e) => {
                        // Announce anyway; the record may be announced again later.
                        report.store_failures += 1;
                        log::error!("Could not store {}: {}", record.link, e);
                    }
                }

                match self.notifier.notify(record).await {
                    Ok(()) => report.notified += 1,
                    Err(e) => {
                        report.delivery_failures += 1;
                        log::warn!("Notification lost: {}", e);
                    }
                }
            }
            DeliveryPolicy::DeliverFirst => match self.notifier.notify(record).await {
                Ok(()) => {
                    report.notified += 1;
                    match self.store.put(record).await {
                        Ok(true) => report.persisted += 1,
                        Ok(false) => {}
                        Err(e) => {
                            report.store_failures += 1;
                            log::error!("Could not store {}: {}", record.link, e);
                        }
                    }
                }
                Err(e) => {
                    report.delivery_failures += 1;
                    log::warn!("Notification failed, will retry next cycle: {}", e);
                }
            },
        }
    }
}
