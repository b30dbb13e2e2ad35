//! Tab-scoped key/value storage for the persisted session record.
//!
//! A storage instance belongs to exactly one tab/window. Two tabs must be
//! given two instances (or two directories); that isolation is what makes a
//! session per-tab.
//!
//! # Atomic Writes
//!
//! `FileStorage` writes through temp file + rename so a crash mid-write never
//! leaves a truncated record behind.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs_err as fs;
use tempfile::NamedTempFile;

use crate::error::{Result, TelemetryError};

/// Synchronous string storage keyed by a fixed name.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory storage; lives as long as the tab that owns it.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| TelemetryError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| TelemetryError::LockPoisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One file per key inside a tab directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

fn storage_err(context: String) -> impl FnOnce(std::io::Error) -> TelemetryError {
    move |source| TelemetryError::Storage { context, source }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_err(format!("read {}", key))(err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(storage_err("create tab directory".into()))?;
        let mut temp_file =
            NamedTempFile::new_in(&self.dir).map_err(storage_err("create temp file".into()))?;
        temp_file
            .write_all(value.as_bytes())
            .map_err(storage_err(format!("write {}", key)))?;
        temp_file
            .flush()
            .map_err(storage_err(format!("flush {}", key)))?;
        temp_file
            .persist(self.key_path(key))
            .map_err(|e| storage_err(format!("persist {}", key))(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.get("k").unwrap().is_none());
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn memory_storages_do_not_share_entries() {
        let tab_a = MemoryStorage::new();
        let tab_b = MemoryStorage::new();
        tab_a.set("session", "a").unwrap();
        assert!(tab_b.get("session").unwrap().is_none());
    }

    #[test]
    fn file_storage_creates_directory_on_first_write() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(&temp.path().join("tabs").join("t1"));

        assert!(storage.get("search_telemetry.session").unwrap().is_none());
        storage.set("search_telemetry.session", "{}").unwrap();
        assert_eq!(
            storage.get("search_telemetry.session").unwrap().as_deref(),
            Some("{}")
        );
        assert!(storage.dir().join("search_telemetry.session.json").exists());
    }

    #[test]
    fn file_storage_overwrites_in_place() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path());
        storage.set("k", "one").unwrap();
        storage.set("k", "two").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("two"));
        let files = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn file_storage_treats_empty_file_as_absent() {
        let temp = tempdir().unwrap();
        let storage = FileStorage::new(temp.path());
        std::fs::write(temp.path().join("k.json"), "  \n").unwrap();
        assert!(storage.get("k").unwrap().is_none());
    }
}
