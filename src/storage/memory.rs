//! In-memory record store, for dry runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::ListingRecord;
use crate::storage::RecordStore;

/// Record store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, ListingRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, record: &ListingRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Ok(false);
        }
        records.insert(record.id.clone(), record.clone());
        Ok(true)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.records.read().await.contains_key(id))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ListingRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn clear(&self) -> Result<usize> {
        let mut records = self.records.write().await;
        let removed = records.len();
        records.clear();
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    #[tokio::test]
    async fn test_lookup_by_link_uses_derived_id() {
        let store = MemoryRecordStore::new();
        let r = ListingRecord::new(
            "https://example.com/item/3",
            "t",
            "p",
            "s",
            "d",
            &Location::new("A", "B"),
        );
        store.put(&r).await.unwrap();

        assert_eq!(
            store.get_by_link("https://example.com/item/3").await.unwrap(),
            Some(r)
        );
        assert_eq!(store.get_by_link("https://example.com/item/4").await.unwrap(), None);
    }
}
