// src/models/mod.rs

//! Domain models for the listing watcher.
//!
//! This module contains the listing record and the configuration
//! structures used throughout the application.

mod config;
mod listing;

// Re-export all public types
pub use config::{
    BrowserConfig, Config, DeliveryPolicy, ExtractorConfig, LoggingConfig, NotifierConfig,
    PathsConfig, ScheduleConfig, SourceConfig,
};
pub use listing::{ListingRecord, Location, listing_id};
