//! The cache manager: Drive links in, validated video files out.
//!
//! Everything here is blocking (std::fs plus a blocking HTTP client); the
//! server runs each call on tokio's blocking pool. State that must outlive a
//! request lives on disk, so a manager can be rebuilt at any time from its
//! cache directory.

use std::{
    collections::{HashMap, HashSet},
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    config::Settings,
    content::{ContentClass, classify_content},
    drive::{DriveFetcher, HttpFetcher, extract_file_id, filename_from_disposition, open_download},
    error::{CacheError, CacheResult},
    store::{CacheEntry, EntryStore},
};

const MIB: f64 = 1024.0 * 1024.0;
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Result of [`CacheManager::resolve_and_cache`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheOutcome {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub file_id: String,
    pub size_mb: f64,
    /// `true` when the file was already on disk and nothing was downloaded.
    pub cached: bool,
}

/// One row of [`CacheManager::list_cached`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedVideo {
    pub filename: String,
    pub size_mb: f64,
    pub is_gdrive_cached: bool,
}

pub struct CacheManager {
    cache_dir: PathBuf,
    store: Arc<dyn EntryStore>,
    fetcher: Arc<dyn DriveFetcher>,
    drive_base_url: String,
    max_download_bytes: u64,
    /// One lock per file ID currently being resolved.
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

enum Reservation {
    Fresh { filename: String, file: File },
    SameFile(CacheOutcome),
}

impl CacheManager {
    /// Creates the cache directory if needed.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        store: Arc<dyn EntryStore>,
        fetcher: Arc<dyn DriveFetcher>,
    ) -> CacheResult<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|err| {
            CacheError::storage(format!("creating {}", cache_dir.display()), err)
        })?;
        let defaults = Settings::default();
        Ok(Self {
            cache_dir,
            store,
            fetcher,
            drive_base_url: defaults.drive_base_url,
            max_download_bytes: defaults.max_download_bytes,
            inflight: Mutex::new(HashMap::new()),
        })
    }

    /// Wires up the configured store backend and a ureq fetcher.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let store = settings.store_backend.open(&settings.cache_dir)?;
        let fetcher = Arc::new(HttpFetcher::new(
            settings.connect_timeout,
            settings.read_timeout,
        ));
        Ok(Self::new(&settings.cache_dir, store, fetcher)?
            .with_drive_base_url(&settings.drive_base_url)
            .with_max_download_bytes(settings.max_download_bytes))
    }

    pub fn with_drive_base_url(mut self, base: impl Into<String>) -> Self {
        self.drive_base_url = base.into();
        self
    }

    pub fn with_max_download_bytes(mut self, limit: u64) -> Self {
        self.max_download_bytes = limit;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Downloads the video behind a Drive link into the cache, or returns
    /// the copy already there.
    pub fn resolve_and_cache(&self, url: &str) -> CacheResult<CacheOutcome> {
        let url = url.trim();
        if url.is_empty() {
            return Err(CacheError::MissingUrl);
        }
        let file_id = extract_file_id(url).ok_or_else(|| CacheError::InvalidUrl {
            url: url.to_string(),
        })?;

        // Serializes work on the same file ID so a second request waits for
        // the first and then sees its cache hit.
        let slot = self
            .inflight
            .lock()
            .entry(file_id.clone())
            .or_default()
            .clone();
        let outcome = {
            let _guard = slot.lock();
            self.resolve_locked(url, &file_id)
        };
        {
            // Clones are only taken under this lock, so the count is stable
            // here. One reference in the map plus ours means nobody waits.
            let mut inflight = self.inflight.lock();
            if Arc::strong_count(&slot) == 2 {
                inflight.remove(&file_id);
            }
            drop(slot);
        }

        match &outcome {
            Ok(result) if result.cached => {
                debug!(file_id, filename = %result.filename, "served from cache")
            }
            Ok(result) => info!(
                file_id,
                filename = %result.filename,
                size_mb = result.size_mb,
                "downloaded video from Google Drive"
            ),
            Err(err) => warn!(file_id, error = %err, "Google Drive download failed"),
        }
        outcome
    }

    fn resolve_locked(&self, url: &str, file_id: &str) -> CacheResult<CacheOutcome> {
        if let Some(hit) = self.cached_copy(file_id)? {
            return Ok(hit);
        }

        let mut response = open_download(self.fetcher.as_ref(), &self.drive_base_url, file_id)?;
        if !response.is_success() {
            return Err(CacheError::DownloadFailed {
                status: response.status,
            });
        }

        let disposition_name = response
            .content_disposition
            .as_deref()
            .and_then(filename_from_disposition);
        let kind = match classify_content(
            response.content_type.as_deref(),
            disposition_name.as_deref(),
        ) {
            ContentClass::Video(kind) => kind,
            ContentClass::Unsupported(detected) => {
                return Err(CacheError::UnsupportedType { detected });
            }
        };

        if let Some(declared) = response.content_length {
            if declared > self.max_download_bytes {
                return Err(CacheError::SizeExceeded {
                    limit_bytes: self.max_download_bytes,
                });
            }
        }

        let preferred =
            disposition_name.unwrap_or_else(|| format!("video_{file_id}.{}", kind.extension()));
        let (filename, file) = match self.reserve_filename(file_id, &preferred)? {
            Reservation::Fresh { filename, file } => (filename, file),
            Reservation::SameFile(outcome) => return Ok(outcome),
        };

        let path = self.cache_dir.join(&filename);
        let written = match copy_capped(&mut response.body, file, self.max_download_bytes) {
            Ok(written) => written,
            Err(err) => {
                discard_partial(&path);
                return Err(err);
            }
        };

        // The entry only appears once the file is complete on disk.
        let entry = CacheEntry::new(file_id, &filename, url, written);
        if let Err(err) = self.store.put(&entry) {
            discard_partial(&path);
            return Err(store_error("recording cache entry", err));
        }
        self.release_other_claims(file_id, &filename);

        Ok(CacheOutcome {
            success: true,
            message: "Video downloaded and cached successfully".to_string(),
            filename,
            file_id: file_id.to_string(),
            size_mb: size_mb(written),
            cached: false,
        })
    }

    /// Returns a hit when an entry exists and its file is still on disk. An
    /// entry whose file was removed by hand is treated as absent and will be
    /// overwritten by the next download.
    fn cached_copy(&self, file_id: &str) -> CacheResult<Option<CacheOutcome>> {
        let Some(entry) = self
            .store
            .get(file_id)
            .map_err(|err| store_error("reading cache entry", err))?
        else {
            return Ok(None);
        };

        if !is_plain_filename(&entry.filename) {
            warn!(file_id, filename = %entry.filename, "ignoring entry with unsafe filename");
            return Ok(None);
        }

        let meta = match fs::metadata(self.cache_dir.join(&entry.filename)) {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                debug!(file_id, filename = %entry.filename, "entry present but file missing");
                return Ok(None);
            }
        };

        // The name may have been reused by a later download of another file.
        let owner = self
            .store
            .entries_named(&entry.filename)
            .map_err(|err| store_error("reading cache entry", err))?
            .into_iter()
            .next();
        if owner.is_some_and(|owner| owner.file_id != file_id) {
            debug!(file_id, filename = %entry.filename, "filename now owned by another entry");
            return Ok(None);
        }

        Ok(Some(already_cached(&entry.filename, file_id, meta.len())))
    }

    /// Drops entries of other file IDs that still name `filename`.
    fn release_other_claims(&self, file_id: &str, filename: &str) {
        let claims = match self.store.entries_named(filename) {
            Ok(claims) => claims,
            Err(err) => {
                warn!(filename, error = %err, "could not check for stale entries");
                return;
            }
        };
        for stale in claims.iter().filter(|entry| entry.file_id != file_id) {
            match self.store.delete(&stale.file_id) {
                Ok(_) => debug!(filename, stale_id = %stale.file_id, "removed stale entry"),
                Err(err) => warn!(
                    filename,
                    stale_id = %stale.file_id,
                    error = %err,
                    "could not remove stale entry"
                ),
            }
        }
    }

    /// Claims a unique name by creating the file exclusively, trying
    /// `name`, `name_1`, `name_2`, ... until one is free.
    fn reserve_filename(&self, file_id: &str, preferred: &str) -> CacheResult<Reservation> {
        let (stem, ext) = split_extension(preferred);
        let mut counter = 0u32;
        loop {
            let candidate = if counter == 0 {
                preferred.to_string()
            } else {
                format!("{stem}_{counter}{ext}")
            };
            let path = self.cache_dir.join(&candidate);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    return Ok(Reservation::Fresh {
                        filename: candidate,
                        file,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    let owner = self
                        .store
                        .entries_named(&candidate)
                        .map_err(|err| store_error("reading cache entry", err))?
                        .into_iter()
                        .next();
                    if owner.is_some_and(|entry| entry.file_id == file_id) {
                        let size = fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
                        return Ok(Reservation::SameFile(already_cached(
                            &candidate, file_id, size,
                        )));
                    }
                    counter += 1;
                }
                Err(err) => {
                    return Err(CacheError::storage(
                        format!("creating {}", path.display()),
                        err,
                    ));
                }
            }
        }
    }

    /// Every visible file in the cache directory, flagged when it came from
    /// Google Drive. Sorted by filename.
    pub fn list_cached(&self) -> CacheResult<Vec<CachedVideo>> {
        let from_drive: HashSet<String> = self
            .store
            .list()
            .map_err(|err| store_error("listing cache entries", err))?
            .into_iter()
            .map(|entry| entry.filename)
            .collect();

        let mut videos = Vec::new();
        for entry in WalkDir::new(&self.cache_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
        {
            let filename = entry.file_name().to_string_lossy().into_owned();
            if filename.starts_with('.') {
                continue;
            }
            let size = entry.metadata().map(|meta| meta.len()).unwrap_or(0);
            videos.push(CachedVideo {
                is_gdrive_cached: from_drive.contains(&filename),
                size_mb: size_mb(size),
                filename,
            });
        }
        videos.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(videos)
    }

    /// Removes a cached file and every entry that names it.
    pub fn delete_cached(&self, filename: &str) -> CacheResult<()> {
        let path = self.video_path(filename)?;
        let not_found = || CacheError::NotFound {
            filename: filename.to_string(),
        };

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(not_found()),
        }
        fs::remove_file(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => not_found(),
            _ => CacheError::storage(format!("removing {}", path.display()), err),
        })?;

        for entry in self
            .store
            .entries_named(filename)
            .map_err(|err| store_error("reading cache entry", err))?
        {
            self.store
                .delete(&entry.file_id)
                .map_err(|err| store_error("removing cache entry", err))?;
        }

        info!(filename, "deleted cached video");
        Ok(())
    }

    /// Path of a cached file. Hidden names and anything that could leave the
    /// cache directory are reported as not found.
    pub fn video_path(&self, filename: &str) -> CacheResult<PathBuf> {
        if !is_plain_filename(filename) {
            return Err(CacheError::NotFound {
                filename: filename.to_string(),
            });
        }
        Ok(self.cache_dir.join(filename))
    }
}

fn already_cached(filename: &str, file_id: &str, size: u64) -> CacheOutcome {
    CacheOutcome {
        success: true,
        message: "Video already cached".to_string(),
        filename: filename.to_string(),
        file_id: file_id.to_string(),
        size_mb: size_mb(size),
        cached: true,
    }
}

/// Streams `body` into `file`, failing once more than `limit` bytes arrive.
fn copy_capped<R: Read + ?Sized>(body: &mut R, file: File, limit: u64) -> CacheResult<u64> {
    let mut writer = BufWriter::new(file);
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(CacheError::Network(format!("reading download body: {err}")));
            }
        };
        total += read as u64;
        if total > limit {
            return Err(CacheError::SizeExceeded { limit_bytes: limit });
        }
        writer
            .write_all(&buf[..read])
            .map_err(|err| CacheError::storage("writing download", err))?;
    }

    let file = writer
        .into_inner()
        .map_err(|err| CacheError::storage("flushing download", err.into_error()))?;
    file.sync_all()
        .map_err(|err| CacheError::storage("syncing download", err))?;
    Ok(total)
}

fn discard_partial(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "could not remove partial download");
        }
    }
}

fn store_error(context: &str, err: anyhow::Error) -> CacheError {
    CacheError::storage(context, io::Error::other(format!("{err:#}")))
}

/// `("clip", ".mp4")` for `clip.mp4`; names without a dot have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

/// Bytes to MiB, rounded to two decimals.
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / MIB * 100.0).round() / 100.0
}
