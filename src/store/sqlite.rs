//! SQLite backend for cache entries.
//!
//! The database lives inside the cache directory as a hidden file, so video
//! listings never pick it up. Like the rest of the crate it is used from
//! blocking worker threads: every call opens a short-lived connection, which
//! keeps the store `Sync` without a connection pool and means a long write
//! never pins a connection that another request needs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::warn;

use super::{CacheEntry, EntryStore};

pub const INDEX_DB_FILE: &str = ".gdrive_index.db";

/// Timestamp layout shared with the sidecar JSON files.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Opens (and if necessary creates) the index inside `cache_dir` and
    /// makes sure the schema exists. WAL mode keeps listings from blocking
    /// on a concurrent insert.
    pub fn open(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .with_context(|| format!("creating cache directory {}", cache_dir.display()))?;

        let store = Self {
            db_path: cache_dir.join(INDEX_DB_FILE),
        };

        let mut conn = store.connect()?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("enabling WAL mode for cache index")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("setting cache index synchronous mode")?;

        // Wrapped in a transaction so a failure leaves the DB untouched.
        let tx = conn.transaction()?;
        tx.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                file_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                original_url TEXT NOT NULL DEFAULT '',
                file_size_bytes INTEGER NOT NULL DEFAULT 0,
                download_date TEXT NOT NULL,
                source TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_cache_entries_filename
                ON cache_entries(filename);
            "#,
        )?;
        tx.commit()?;

        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .with_context(|| format!("opening cache index {}", self.db_path.display()))
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }
}

impl EntryStore for SqliteStore {
    fn get(&self, file_id: &str) -> Result<Option<CacheEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT file_id, filename, original_url, file_size_bytes,
                       download_date, source
                FROM cache_entries
                WHERE file_id = ?1
                "#,
            )?;
            let row = stmt
                .query_row([file_id], |row| Ok(row_to_entry(row)))
                .optional()?;
            Ok(row.and_then(keep_readable))
        })
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                r#"
                INSERT INTO cache_entries (
                    file_id, filename, original_url, file_size_bytes,
                    download_date, source
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(file_id) DO UPDATE SET
                    filename = excluded.filename,
                    original_url = excluded.original_url,
                    file_size_bytes = excluded.file_size_bytes,
                    download_date = excluded.download_date,
                    source = excluded.source
                "#,
                params![
                    entry.file_id,
                    entry.filename,
                    entry.original_url,
                    entry.size_bytes as i64,
                    entry
                        .download_timestamp
                        .format(TIMESTAMP_FORMAT)
                        .to_string(),
                    entry.source,
                ],
            )
            .with_context(|| format!("storing cache entry {}", entry.file_id))?;
            Ok(())
        })
    }

    fn delete(&self, file_id: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn.execute(
                "DELETE FROM cache_entries WHERE file_id = ?1",
                params![file_id],
            )?;
            Ok(removed > 0)
        })
    }

    fn list(&self) -> Result<Vec<CacheEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT file_id, filename, original_url, file_size_bytes,
                       download_date, source
                FROM cache_entries
                ORDER BY filename ASC
                "#,
            )?;
            let mut rows = stmt.query([])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                if let Some(entry) = keep_readable(row_to_entry(row)) {
                    entries.push(entry);
                }
            }
            Ok(entries)
        })
    }

    fn entries_named(&self, filename: &str) -> Result<Vec<CacheEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT file_id, filename, original_url, file_size_bytes,
                       download_date, source
                FROM cache_entries
                WHERE filename = ?1
                ORDER BY download_date DESC
                "#,
            )?;
            let mut rows = stmt.query([filename])?;
            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                if let Some(entry) = keep_readable(row_to_entry(row)) {
                    entries.push(entry);
                }
            }
            Ok(entries)
        })
    }
}

/// Converts a row into a `CacheEntry`, parsing the stored timestamp text.
fn row_to_entry(row: &Row<'_>) -> Result<CacheEntry> {
    let download_date: String = row.get("download_date")?;
    let download_timestamp = NaiveDateTime::parse_from_str(&download_date, TIMESTAMP_FORMAT)
        .with_context(|| format!("parsing stored download date {download_date:?}"))?;
    let size: i64 = row.get("file_size_bytes")?;

    Ok(CacheEntry {
        file_id: row.get("file_id")?,
        filename: row.get("filename")?,
        original_url: row.get("original_url")?,
        size_bytes: size.max(0) as u64,
        download_timestamp,
        source: row.get("source")?,
    })
}

fn keep_readable(entry: Result<CacheEntry>) -> Option<CacheEntry> {
    match entry {
        Ok(entry) => Some(entry),
        Err(err) => {
            warn!(error = %err, "ignoring unreadable cache index row");
            None
        }
    }
}
