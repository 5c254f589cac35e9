//! Bookkeeping for videos that came from Google Drive.
//!
//! Each cached Drive download has one [`CacheEntry`] keyed by its file ID.
//! The resolver only talks to the [`EntryStore`] trait; the JSON sidecar
//! layout is the default backend and the SQLite index is an alternative for
//! caches holding many entries.

mod sidecar;
mod sqlite;

use std::{path::Path, sync::Arc};

use anyhow::{Result, bail};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use sidecar::SidecarStore;
pub use sqlite::SqliteStore;

/// Provenance tag written into every entry.
pub const GOOGLE_DRIVE_SOURCE: &str = "google_drive";

/// One downloaded file and where it came from.
///
/// Field names on disk follow the sidecar format already in use
/// (`file_size_bytes`, `download_date`), so existing caches stay readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub file_id: String,
    pub filename: String,
    #[serde(default)]
    pub original_url: String,
    #[serde(rename = "file_size_bytes", alias = "size_bytes", default)]
    pub size_bytes: u64,
    #[serde(rename = "download_date", alias = "download_timestamp")]
    pub download_timestamp: NaiveDateTime,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    GOOGLE_DRIVE_SOURCE.to_string()
}

impl CacheEntry {
    pub fn new(
        file_id: impl Into<String>,
        filename: impl Into<String>,
        original_url: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            filename: filename.into(),
            original_url: original_url.into(),
            size_bytes,
            download_timestamp: chrono::Local::now().naive_local(),
            source: default_source(),
        }
    }
}

/// Key-value store of cache entries.
///
/// Implementations must tolerate damaged records: an unreadable entry is
/// logged and treated as absent rather than failing the lookup.
pub trait EntryStore: Send + Sync {
    fn get(&self, file_id: &str) -> Result<Option<CacheEntry>>;

    /// Inserts or replaces the entry for `entry.file_id`. Must not leave a
    /// half-written record behind.
    fn put(&self, entry: &CacheEntry) -> Result<()>;

    /// Removes the entry; returns whether one existed.
    fn delete(&self, file_id: &str) -> Result<bool>;

    fn list(&self) -> Result<Vec<CacheEntry>>;

    /// Entries naming `filename`, newest download first. A file has at most
    /// one owner once writes go through the cache manager, but older
    /// directories can hold stale claims.
    fn entries_named(&self, filename: &str) -> Result<Vec<CacheEntry>> {
        let mut entries: Vec<CacheEntry> = self
            .list()?
            .into_iter()
            .filter(|entry| entry.filename == filename)
            .collect();
        entries.sort_by(|a, b| b.download_timestamp.cmp(&a.download_timestamp));
        Ok(entries)
    }
}

/// Which [`EntryStore`] backs a cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Sidecar,
    Sqlite,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sidecar" | "json" => Ok(Self::Sidecar),
            "sqlite" => Ok(Self::Sqlite),
            other => bail!("unknown store backend {other:?} (expected sidecar or sqlite)"),
        }
    }

    pub fn open(self, cache_dir: &Path) -> Result<Arc<dyn EntryStore>> {
        Ok(match self {
            Self::Sidecar => Arc::new(SidecarStore::new(cache_dir)),
            Self::Sqlite => Arc::new(SqliteStore::open(cache_dir)?),
        })
    }
}
