//! Best-effort inspection artifacts.
//!
//! Raw markup of every successful fetch and a flat text dump of the
//! candidates of the latest cycle. Nothing here may fail a cycle: errors
//! are logged and swallowed.
//!
//! ```text
//! artifacts/
//! ├── body/
//! │   └── body_HH_MM_SS.html
//! └── entries/
//!     └── entries.txt
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::models::ListingRecord;

const ENTRY_SEPARATOR: &str = "------------------------------";

/// Writer for inspection artifacts rooted at one directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the markup artifact for a fetch at `at`.
    pub fn markup_path(&self, at: DateTime<Local>) -> PathBuf {
        self.root
            .join("body")
            .join(format!("body_{}.html", at.format("%H_%M_%S")))
    }

    /// Path of the candidate dump.
    pub fn entries_path(&self) -> PathBuf {
        self.root.join("entries").join("entries.txt")
    }

    /// Save fetched markup. Returns the written path on success.
    pub async fn save_markup(&self, markup: &str, at: DateTime<Local>) -> Option<PathBuf> {
        let path = self.markup_path(at);
        match write_file(&path, markup.as_bytes()).await {
            Ok(()) => {
                log::debug!("HTML saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("Could not save markup to {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Overwrite the candidate dump with `records`.
    pub async fn save_records(&self, records: &[ListingRecord]) -> Option<PathBuf> {
        let path = self.entries_path();
        match write_file(&path, render_records(records).as_bytes()).await {
            Ok(()) => {
                log::debug!("{} entries saved to {}", records.len(), path.display());
                Some(path)
            }
            Err(e) => {
                log::warn!("Could not save entries to {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Text form of the candidate dump.
pub fn render_records(records: &[ListingRecord]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&record.to_string());
        out.push('\n');
        out.push_str(ENTRY_SEPARATOR);
        out.push('\n');
    }
    out
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
