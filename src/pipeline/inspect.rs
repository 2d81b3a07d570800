// src/pipeline/inspect.rs

//! Offline extraction of a saved page.

use std::path::Path;

use crate::error::Result;
use crate::models::{Config, ListingRecord};
use crate::services::ListingExtractor;
use crate::utils::log as report_log;

/// Outcome of inspecting one saved page.
#[derive(Debug, Clone, Default)]
pub struct InspectReport {
    pub cards: usize,
    pub records: Vec<ListingRecord>,
    pub skipped: Vec<String>,
}

/// Run the extractor over a markup file and log what it finds.
pub async fn run_inspect(config: &Config, path: &Path) -> Result<InspectReport> {
    let markup = tokio::fs::read_to_string(path).await?;
    let extractor = ListingExtractor::new(&config.source.domain, &config.extractor)?;
    let report = inspect_markup(&extractor, &markup);

    report_log::header(&format!("Inspecting {}", path.display()));
    for record in &report.records {
        for line in record.to_string().lines() {
            report_log::sub_item(line);
        }
        report_log::sub_item(&"-".repeat(30));
    }
    for reason in &report.skipped {
        log::warn!("Skipped: {}", reason);
    }
    report_log::summary(
        "Inspection",
        &[
            ("Cards", report.cards.to_string()),
            ("Records", report.records.len().to_string()),
            ("Skipped", report.skipped.len().to_string()),
        ],
    );

    Ok(report)
}

fn inspect_markup(extractor: &ListingExtractor, markup: &str) -> InspectReport {
    let page = extractor.parse(markup);
    let mut report = InspectReport {
        cards: page.card_count(),
        ..InspectReport::default()
    };
    for candidate in page.candidates() {
        match candidate {
            Ok(record) => report.records.push(record),
            Err(skip) => report.skipped.push(skip.to_string()),
        }
    }
    report
}
