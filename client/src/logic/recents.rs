//! Recents Cache
//!
//! Bounded, newest-first list of recently created or viewed prediction IDs,
//! persisted under the `predictions` key. It is a convenience index only and
//! may drift from the server until reconciled with the history endpoint.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::constants::{KEY_PREDICTIONS, RECENTS_LIMIT};
use crate::logic::prediction::record::is_custom_id;
use crate::logic::storage::{LocalStore, StorageError};

/// Denormalized summary of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentPredictionEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub rock_type: String,
    #[serde(default)]
    pub custom_id: bool,
}

impl RecentPredictionEntry {
    /// Entry stamped with the current time
    pub fn now(id: impl Into<String>, rock_type: impl Into<String>, custom_id: bool) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            rock_type: rock_type.into(),
            custom_id,
        }
    }
}

pub struct RecentsCache {
    store: Arc<LocalStore>,
    limit: usize,
    // serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl RecentsCache {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self::with_limit(store, RECENTS_LIMIT)
    }

    pub fn with_limit(store: Arc<LocalStore>, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
            lock: Mutex::new(()),
        }
    }

    /// Entries, newest first
    pub fn list(&self) -> Vec<RecentPredictionEntry> {
        let mut entries = self.load();
        entries.truncate(self.limit);
        entries
    }

    pub fn get(&self, id: &str) -> Option<RecentPredictionEntry> {
        self.load().into_iter().find(|e| e.id == id)
    }

    /// Insert at the front, replacing any entry with the same id
    pub fn push(&self, entry: RecentPredictionEntry) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.load();
        entries.retain(|e| e.id != entry.id);
        entries.insert(0, entry);
        self.save(entries)
    }

    /// Record that `id` was just viewed. An existing entry moves to the front
    /// and keeps its `customId` flag.
    pub fn touch(&self, id: &str, rock_type: Option<&str>) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.load();

        let entry = match entries.iter().position(|e| e.id == id) {
            Some(pos) => {
                let mut entry = entries.remove(pos);
                entry.timestamp = Utc::now();
                if let Some(rock_type) = rock_type {
                    entry.rock_type = rock_type.to_string();
                }
                entry
            }
            None => RecentPredictionEntry::now(id, rock_type.unwrap_or_default(), is_custom_id(id)),
        };

        entries.insert(0, entry);
        self.save(entries)
    }

    /// Remove `id`; returns whether an entry was present
    pub fn remove(&self, id: &str) -> Result<bool, StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.load();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(entries)?;
        Ok(true)
    }

    /// Update the rock type of an existing entry in place
    pub fn update_rock_type(&self, id: &str, rock_type: &str) -> Result<bool, StorageError> {
        let _guard = self.lock.lock();
        let mut entries = self.load();
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        entry.rock_type = rock_type.to_string();
        self.save(entries)?;
        Ok(true)
    }

    /// Overwrite the cache, e.g. with server history
    pub fn replace_all(&self, mut entries: Vec<RecentPredictionEntry>) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let mut seen = std::collections::HashSet::new();
        entries.retain(|e| seen.insert(e.id.clone()));
        self.save(entries)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        self.store.remove(KEY_PREDICTIONS)
    }

    fn load(&self) -> Vec<RecentPredictionEntry> {
        self.store.get(KEY_PREDICTIONS).unwrap_or_default()
    }

    fn save(&self, mut entries: Vec<RecentPredictionEntry>) -> Result<(), StorageError> {
        entries.truncate(self.limit);
        self.store.set(KEY_PREDICTIONS, &entries)
    }
}
