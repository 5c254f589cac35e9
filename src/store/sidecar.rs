//! JSON sidecar backend: one hidden `.gdrive_meta_{file_id}.json` per entry,
//! stored next to the videos.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::warn;

use super::{CacheEntry, EntryStore};

const SIDECAR_PREFIX: &str = ".gdrive_meta_";
const SIDECAR_SUFFIX: &str = ".json";

#[derive(Debug, Clone)]
pub struct SidecarStore {
    dir: PathBuf,
}

impl SidecarStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn sidecar_name(file_id: &str) -> String {
        format!("{SIDECAR_PREFIX}{file_id}{SIDECAR_SUFFIX}")
    }

    fn path_for(&self, file_id: &str) -> PathBuf {
        self.dir.join(Self::sidecar_name(file_id))
    }

    /// Parses one sidecar. `None` covers both "missing" and "damaged".
    fn read(&self, path: &Path) -> Result<Option<CacheEntry>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable sidecar");
                Ok(None)
            }
        }
    }
}

impl EntryStore for SidecarStore {
    fn get(&self, file_id: &str) -> Result<Option<CacheEntry>> {
        self.read(&self.path_for(file_id))
    }

    fn put(&self, entry: &CacheEntry) -> Result<()> {
        write_json_atomic(&self.path_for(&entry.file_id), entry)
    }

    fn delete(&self, file_id: &str) -> Result<bool> {
        let path = self.path_for(file_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err).with_context(|| format!("removing {}", path.display())),
        }
    }

    fn list(&self) -> Result<Vec<CacheEntry>> {
        let dir = match fs::read_dir(&self.dir) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("listing {}", self.dir.display()));
            }
        };

        let mut entries = Vec::new();
        for item in dir {
            let item = item.with_context(|| format!("listing {}", self.dir.display()))?;
            let name = item.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with(SIDECAR_PREFIX) || !name.ends_with(SIDECAR_SUFFIX) {
                continue;
            }
            if let Some(entry) = self.read(&item.path())? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

/// Writes to a hidden temp file and renames it into place so readers never
/// observe a partial record.
fn write_json_atomic(path: &Path, entry: &CacheEntry) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let payload = serde_json::to_vec_pretty(entry).context("serializing cache entry")?;
    fs::write(&tmp_path, payload).with_context(|| format!("writing {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("renaming into {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_get_delete() -> Result<()> {
        let dir = tempdir()?;
        let store = SidecarStore::new(dir.path());
        let entry = CacheEntry::new("abc", "clip.mp4", "https://x/?id=abc", 42);

        store.put(&entry)?;
        assert!(dir.path().join(".gdrive_meta_abc.json").exists());
        assert!(!dir.path().join(".gdrive_meta_abc.json.tmp").exists());
        assert_eq!(store.get("abc")?, Some(entry.clone()));
        assert_eq!(store.entries_named("clip.mp4")?, vec![entry]);

        assert!(store.delete("abc")?);
        assert!(!store.delete("abc")?);
        assert_eq!(store.get("abc")?, None);
        Ok(())
    }

    #[test]
    fn put_replaces_existing_record() -> Result<()> {
        let dir = tempdir()?;
        let store = SidecarStore::new(dir.path());
        store.put(&CacheEntry::new("abc", "old.mp4", "u", 1))?;
        store.put(&CacheEntry::new("abc", "new.mp4", "u", 2))?;
        let entries = store.list()?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "new.mp4");
        Ok(())
    }

    #[test]
    fn damaged_sidecars_are_skipped() -> Result<()> {
        let dir = tempdir()?;
        let store = SidecarStore::new(dir.path());
        fs::write(dir.path().join(".gdrive_meta_bad.json"), "{not json")?;
        fs::write(dir.path().join("video.mp4"), "bytes")?;
        store.put(&CacheEntry::new("good", "good.mp4", "u", 5))?;

        assert_eq!(store.get("bad")?, None);
        let entries = store.list()?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_id, "good");
        Ok(())
    }

    #[test]
    fn missing_directory_lists_nothing() -> Result<()> {
        let dir = tempdir()?;
        let store = SidecarStore::new(dir.path().join("absent"));
        assert!(store.list()?.is_empty());
        assert_eq!(store.get("x")?, None);
        Ok(())
    }
}
