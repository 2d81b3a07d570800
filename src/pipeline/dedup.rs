// src/pipeline/dedup.rs

//! Partition of candidate records into new and already seen.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{ListingRecord, listing_id};
use crate::storage::RecordStore;

/// Deduplication key of a record: the digest of its link.
pub fn key_of(record: &ListingRecord) -> String {
    listing_id(&record.link)
}

/// Candidates split by whether they were announced before.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub new: Vec<ListingRecord>,
    pub seen: Vec<ListingRecord>,
}

/// Classifies candidates against the record store.
pub struct DedupFilter<K = fn(&ListingRecord) -> String> {
    key: K,
}

impl DedupFilter {
    /// Filter keyed by [`key_of`].
    pub fn new() -> Self {
        Self::with_key(key_of)
    }
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> DedupFilter<K>
where
    K: Fn(&ListingRecord) -> String + Send + Sync,
{
    /// Filter keyed by a custom extraction function.
    pub fn with_key(key: K) -> Self {
        Self { key }
    }

    pub fn key(&self, record: &ListingRecord) -> String {
        (self.key)(record)
    }

    /// Split `candidates` into new and seen, keeping page order in each.
    ///
    /// Reads the store only. A key repeated within `candidates` is new on
    /// its first occurrence and seen afterwards.
    pub async fn partition(
        &self,
        store: &dyn RecordStore,
        candidates: Vec<ListingRecord>,
    ) -> Result<Partition> {
        let mut partition = Partition::default();
        let mut batch = HashSet::new();

        for candidate in candidates {
            let key = self.key(&candidate);
            if batch.contains(&key) || store.exists(&key).await? {
                partition.seen.push(candidate);
            } else {
                batch.insert(key);
                partition.new.push(candidate);
            }
        }

        Ok(partition)
    }
}
