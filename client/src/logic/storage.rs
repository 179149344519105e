//! Local Store
//!
//! File-backed key/value store holding the client's persisted state:
//! - `token` / `user` for the session
//! - `predictions` for the recents cache
//! - `userSettings` / `preferred_language` for settings
//!
//! Every mutation is written through to disk immediately.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistent key/value store
pub struct LocalStore {
    /// `None` keeps everything in memory
    file_path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl LocalStore {
    /// Open (or create) the store at `path`.
    ///
    /// A corrupt file is logged and treated as empty; it is overwritten on
    /// the next write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let file_path = path.as_ref().to_path_buf();

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = if file_path.exists() {
            let content = fs::read_to_string(&file_path)?;
            match serde_json::from_str::<BTreeMap<String, Value>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    log::warn!("Local store {} is corrupt, starting empty: {}", file_path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        log::debug!("Local store opened: {} ({} keys)", file_path.display(), entries.len());

        Ok(Self {
            file_path: Some(file_path),
            entries: Mutex::new(entries),
        })
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            file_path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Raw JSON value under `key`
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Typed value under `key`. Values that fail to decode read as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_raw(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("Ignoring undecodable local value '{}': {}", key, e);
                None
            }
        }
    }

    /// Store `value` under `key`
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)?;
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    /// Remove `key`; removing a missing key is not an error
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    fn flush(&self, entries: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(entries)?;
        fs::write(path, content)?;
        Ok(())
    }
}
