// src/pipeline/watch.rs

//! Watch pipeline entry points.

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::models::Config;
use crate::pipeline::cycle::{CycleReport, Watcher};
use crate::pipeline::scheduler::{Scheduler, SchedulerReport};
use crate::pipeline::watermark::{CycleKind, format_watermark};
use crate::services::{
    BrowserFetcher, FetchClient, ListingExtractor, LogNotifier, Notifier, TelegramNotifier,
};
use crate::storage::{ArtifactWriter, LocalRecordStore, MemoryRecordStore, RecordStore};
use crate::utils::log as report_log;

/// Options shared by the watch commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Log notifications instead of sending them, and keep state in memory
    pub dry_run: bool,
    /// Stop after this many cycles
    pub max_cycles: Option<usize>,
}

/// Wire a watcher from configuration, keeping the stored records.
pub async fn build_watcher(config: &Config, options: WatchOptions) -> Result<Watcher> {
    let store = open_store(config, options, false).await?;
    wire(config, options, store)
}

/// Record store for a run. A store about to be cleared tolerates a corrupt file.
async fn open_store(
    config: &Config,
    options: WatchOptions,
    reset: bool,
) -> Result<Arc<dyn RecordStore>> {
    if options.dry_run {
        return Ok(Arc::new(MemoryRecordStore::new()));
    }
    let store = if reset {
        LocalRecordStore::open_or_empty(config.store_path()).await
    } else {
        LocalRecordStore::open(config.store_path()).await?
    };
    Ok(Arc::new(store))
}

fn wire(config: &Config, options: WatchOptions, store: Arc<dyn RecordStore>) -> Result<Watcher> {
    let notifier: Arc<dyn Notifier> = if options.dry_run {
        Arc::new(LogNotifier::new(config.notifier.max_message_chars))
    } else {
        Arc::new(TelegramNotifier::new(&config.notifier)?)
    };

    let mut fetch = FetchClient::new(
        Arc::new(BrowserFetcher::new(config.browser.clone())),
        config.source.clone(),
        config.browser.timeout(),
    );
    let extractor = ListingExtractor::new(&config.source.domain, &config.extractor)?;

    let artifacts = config
        .paths
        .save_artifacts
        .then(|| ArtifactWriter::new(&config.paths.artifacts_dir));
    if let Some(writer) = &artifacts {
        fetch = fetch.with_artifacts(writer.clone());
    }

    let mut watcher = Watcher::new(
        fetch,
        extractor,
        store,
        notifier,
        config.schedule.interval(),
    )
    .with_policy(config.schedule.delivery_policy);

    if let Some(writer) = artifacts {
        watcher = watcher.with_artifacts(writer);
    }
    Ok(watcher)
}

/// Clear the store if configured, then poll until `shutdown` resolves.
pub async fn run_watch<F>(
    config: &Config,
    options: WatchOptions,
    shutdown: F,
) -> Result<SchedulerReport>
where
    F: Future<Output = ()>,
{
    report_log::header("Listing watcher starting");
    let store = open_store(config, options, config.schedule.reset_on_start).await?;
    let watcher = wire(config, options, store)?;

    if config.schedule.reset_on_start {
        let removed = watcher.store().clear().await?;
        log::info!("Cleared {} records from a previous run", removed);
    }

    report_log::sub_item(&format!(
        "Source: {}{}",
        config.source.domain, config.source.endpoint_path
    ));
    report_log::sub_item(&format!("Interval: {}s", config.schedule.interval_secs));
    report_log::sub_item(&format!("Delivery policy: {:?}", config.schedule.delivery_policy));

    let mut scheduler = Scheduler::new(config.schedule.interval());
    if let Some(cycles) = options.max_cycles {
        scheduler = scheduler.with_max_cycles(cycles);
    }
    let totals = scheduler.run(&watcher, shutdown).await;

    report_log::summary(
        "Watcher stopped",
        &[
            ("Cycles", totals.cycles.to_string()),
            ("Notified", totals.notified.to_string()),
            ("Blocked", totals.blocked.to_string()),
            ("Fetch failures", totals.fetch_failures.to_string()),
            ("Store failures", totals.store_failures.to_string()),
        ],
    );
    Ok(totals)
}

/// Run a single cycle without clearing the store.
pub async fn run_once(
    config: &Config,
    options: WatchOptions,
    kind: CycleKind,
) -> Result<CycleReport> {
    let watcher = build_watcher(config, options).await?;
    let report = watcher.run_cycle(kind).await?;

    report_log::summary(
        &format!("Cycle after {}", format_watermark(report.watermark)),
        &[
            ("Status", format!("{:?}", report.status)),
            ("Candidates", report.candidates.to_string()),
            ("New", report.new.to_string()),
            ("Seen", report.seen.to_string()),
            ("Notified", report.notified.to_string()),
            ("Delivery failures", report.delivery_failures.to_string()),
            ("Store failures", report.store_failures.to_string()),
        ],
    );
    Ok(report)
}

/// Remove every stored record. A corrupt store file is replaced.
pub async fn run_reset(config: &Config) -> Result<usize> {
    let store = LocalRecordStore::open_or_empty(config.store_path()).await;
    let removed = store.clear().await?;
    log::info!("Removed {} records from {}", removed, store.path().display());
    Ok(removed)
}
