//! Service layer for the listing watcher.
//!
//! This module contains the collaborators of a watch cycle:
//! - Page acquisition (`FetchClient`, `PageFetcher`)
//! - Listing extraction (`ListingExtractor`)
//! - Notification delivery (`Notifier`)

mod extractor;
mod fetcher;
mod notifier;

pub use extractor::{ExtractionSkip, ListingExtractor, ParsedPage};
pub use fetcher::{
    BrowserFetcher, EVASION_SCRIPT, FetchClient, PageFetcher, PageResult, RenderedPage,
    StaticPageFetcher, StaticResponse, is_blocked, search_url,
};
pub use notifier::{LogNotifier, Notifier, TelegramNotifier, format_message};
