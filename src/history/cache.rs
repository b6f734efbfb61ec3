//! Bounded, most-recent-first history of successful generations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::{GenerationResult, Style};
use crate::config::StorageConfig;
use crate::history::store::KeyValueStore;
use crate::preparation::PreparedImage;

/// Persisted record of one past generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub image_url: String,
    pub prompt: String,
    pub style: Style,
    pub created_at: DateTime<Utc>,
}

impl From<&GenerationResult> for HistoryEntry {
    fn from(result: &GenerationResult) -> Self {
        Self {
            id: result.id.clone(),
            image_url: result.image_url.clone(),
            prompt: result.prompt.clone(),
            style: result.style,
            created_at: result.created_at,
        }
    }
}

/// Working state recovered from a history entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredWork {
    pub image: PreparedImage,
    pub prompt: String,
    pub style: Style,
}

/// Put `entry` first, dropping any older entry with the same id, and keep at
/// most `capacity` entries
pub fn push_front_unique(
    list: &[HistoryEntry],
    entry: HistoryEntry,
    capacity: usize,
) -> Vec<HistoryEntry> {
    let rest: Vec<HistoryEntry> = list.iter().filter(|e| e.id != entry.id).cloned().collect();
    let mut next = Vec::with_capacity(capacity.min(rest.len() + 1));
    next.push(entry);
    next.extend(rest);
    next.truncate(capacity);
    next
}

/// Parse persisted history leniently: anything that is not a JSON array
/// yields an empty list, and malformed elements are skipped
pub fn parse_entries(raw: &str, capacity: usize) -> Vec<HistoryEntry> {
    let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(serde_json::Value::Array(values)) => values,
        Ok(_) => {
            debug!("Stored history is not an array; ignoring");
            return Vec::new();
        }
        Err(e) => {
            debug!(error = %e, "Stored history is not valid JSON; ignoring");
            return Vec::new();
        }
    };

    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter_map(|value| serde_json::from_value::<HistoryEntry>(value).ok())
        .filter(|entry| seen.insert(entry.id.clone()))
        .take(capacity)
        .collect()
}

/// Recent generations backed by a key-value store
pub struct HistoryCache {
    store: Arc<dyn KeyValueStore>,
    key: String,
    capacity: usize,
    entries: Vec<HistoryEntry>,
    loaded: bool,
}

impl HistoryCache {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, capacity: usize) -> Self {
        Self {
            store,
            key: key.into(),
            capacity,
            entries: Vec::new(),
            loaded: false,
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &StorageConfig) -> Self {
        Self::new(store, config.history_key.clone(), config.history_capacity)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Read persisted history; never fails.
    ///
    /// A store read error yields an empty list and leaves the cache unloaded,
    /// so the next `record` tries the read again.
    pub async fn load(&mut self) -> Vec<HistoryEntry> {
        let entries = match self.store.get(&self.key).await {
            Ok(raw) => {
                self.loaded = true;
                raw.map(|raw| parse_entries(&raw, self.capacity))
                    .unwrap_or_default()
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to read history");
                Vec::new()
            }
        };
        debug!(count = entries.len(), "Loaded history");
        self.entries = entries.clone();
        entries
    }

    /// Add an entry to the front and persist the new list.
    ///
    /// Stored history is read first unless a `load` already succeeded, so
    /// earlier sessions' entries are kept.
    pub async fn record(&mut self, entry: HistoryEntry) -> Vec<HistoryEntry> {
        if !self.loaded {
            self.load().await;
        }
        debug!(id = %entry.id, "Recording history entry");
        self.entries = push_front_unique(&self.entries, entry, self.capacity);
        self.persist(&self.entries).await;
        self.entries.clone()
    }

    /// Write the list to storage. Failures are logged and swallowed.
    pub async fn persist(&self, list: &[HistoryEntry]) {
        let list = &list[..list.len().min(self.capacity)];
        let raw = match serde_json::to_string(list) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to serialize history");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.key, &raw).await {
            warn!(key = %self.key, error = %e, "Failed to persist history");
        }
    }

    /// Working state for an entry; the cache is left untouched
    pub fn restore(&self, entry: &HistoryEntry) -> RestoredWork {
        RestoredWork {
            image: PreparedImage::from_data_url(entry.image_url.clone()),
            prompt: entry.prompt.clone(),
            style: entry.style,
        }
    }
}
