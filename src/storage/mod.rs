//! Storage abstractions for listing record persistence.
//!
//! The record store is the watcher's memory of which listings it has
//! already announced. It is keyed by the record id, which is derived from
//! the listing link.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! └── records.json          # Seen listings, keyed by id
//! ```

pub mod artifacts;
pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ListingRecord, listing_id};

// Re-export for convenience
pub use artifacts::ArtifactWriter;
pub use local::LocalRecordStore;
pub use memory::MemoryRecordStore;

/// Trait for record storage backends.
///
/// Only one cycle writes at a time, so implementations need nothing beyond
/// atomic single-record upserts.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert the record unless its id is already present.
    ///
    /// Returns `true` when the record was inserted, `false` when it was
    /// already stored. Duplicate inserts are never an error.
    async fn put(&self, record: &ListingRecord) -> Result<bool>;

    /// Whether a record with this id is stored.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Fetch a record by id.
    async fn get_by_id(&self, id: &str) -> Result<Option<ListingRecord>>;

    /// Fetch a record by its listing link.
    async fn get_by_link(&self, link: &str) -> Result<Option<ListingRecord>> {
        self.get_by_id(&listing_id(link)).await
    }

    /// Remove every record, returning how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Number of stored records.
    async fn len(&self) -> Result<usize>;
}
