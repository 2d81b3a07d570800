//! Local filesystem record store.
//!
//! Keeps the whole table in memory and rewrites `records.json` atomically
//! on every mutation. The table grows until it is cleared, either at watcher
//! start (`schedule.reset_on_start`) or by the `reset` command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::ListingRecord;
use crate::storage::RecordStore;

/// On-disk layout of the record file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordFile {
    records: BTreeMap<String, ListingRecord>,
}

/// JSON-file backed record store.
pub struct LocalRecordStore {
    path: PathBuf,
    table: Mutex<RecordFile>,
}

impl LocalRecordStore {
    /// Open the store at `path`, loading existing records if the file exists.
    ///
    /// A file that does not parse is a `Store` error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = Self::load(&path).await?;

        log::debug!(
            "Opened record store {} ({} records)",
            path.display(),
            table.records.len()
        );

        Ok(Self::with_table(path, table))
    }

    /// Open the store at `path` for a caller about to clear it.
    ///
    /// An unreadable or corrupt file is logged and treated as empty; the next
    /// write replaces it.
    pub async fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let table = match Self::load(&path).await {
            Ok(table) => table,
            Err(e) => {
                log::warn!("Discarding unreadable record store: {}", e);
                RecordFile::default()
            }
        };
        Self::with_table(path, table)
    }

    fn with_table(path: PathBuf, table: RecordFile) -> Self {
        Self {
            path,
            table: Mutex::new(table),
        }
    }

    async fn load(path: &Path) -> Result<RecordFile> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::store(format!("corrupt record file {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RecordFile::default()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the table atomically (write to temp, then rename).
    async fn persist(&self, table: &RecordFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(table)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for LocalRecordStore {
    async fn put(&self, record: &ListingRecord) -> Result<bool> {
        let mut table = self.table.lock().await;
        if table.records.contains_key(&record.id) {
            return Ok(false);
        }

        table.records.insert(record.id.clone(), record.clone());
        if let Err(e) = self.persist(&table).await {
            // Keep memory and disk in agreement.
            table.records.remove(&record.id);
            return Err(e);
        }
        Ok(true)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.table.lock().await.records.contains_key(id))
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ListingRecord>> {
        Ok(self.table.lock().await.records.get(id).cloned())
    }

    async fn clear(&self) -> Result<usize> {
        let mut table = self.table.lock().await;
        let removed = table.records.len();
        let previous = std::mem::take(&mut table.records);
        if let Err(e) = self.persist(&table).await {
            table.records = previous;
            return Err(e);
        }
        Ok(removed)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.table.lock().await.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use tempfile::TempDir;

    fn record(link: &str) -> ListingRecord {
        ListingRecord::new(
            link,
            "Title",
            "100",
            "2 rooms",
            "desc",
            &Location::new("City", "Hood"),
        )
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalRecordStore::open(tmp.path().join("records.json"))
            .await
            .unwrap();

        let r = record("https://example.com/item/1");
        assert!(store.put(&r).await.unwrap());
        assert!(!store.put(&r).await.unwrap());
        assert_eq!(store.len().await.unwrap(), 1);
        assert!(store.exists(&r.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/records.json");

        let r = record("https://example.com/item/7");
        {
            let store = LocalRecordStore::open(&path).await.unwrap();
            store.put(&r).await.unwrap();
        }

        let store = LocalRecordStore::open(&path).await.unwrap();
        assert_eq!(store.get_by_id(&r.id).await.unwrap(), Some(r.clone()));
        assert_eq!(store.get_by_link(&r.link).await.unwrap(), Some(r));
    }

    #[tokio::test]
    async fn test_clear_removes_everything_on_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records.json");

        let store = LocalRecordStore::open(&path).await.unwrap();
        store.put(&record("https://example.com/a")).await.unwrap();
        store.put(&record("https://example.com/b")).await.unwrap();
        assert_eq!(store.clear().await.unwrap(), 2);

        let reopened = LocalRecordStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let result = LocalRecordStore::open(&path).await;
        assert!(matches!(result, Err(AppError::Store(_))));
    }

    #[tokio::test]
    async fn test_clear_recovers_truncated_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        tokio::fs::write(&path, b"").await.unwrap();

        let store = LocalRecordStore::open_or_empty(&path).await;
        assert_eq!(store.len().await.unwrap(), 0);
        assert_eq!(store.clear().await.unwrap(), 0);

        let reopened = LocalRecordStore::open(&path).await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_or_empty_keeps_valid_records() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        {
            let store = LocalRecordStore::open(&path).await.unwrap();
            store.put(&record("https://example.com/item/1")).await.unwrap();
        }

        let store = LocalRecordStore::open_or_empty(&path).await;
        assert_eq!(store.clear().await.unwrap(), 1);
    }
}
