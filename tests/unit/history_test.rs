//! Unit tests for the history cache and its stores

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use studio_mini::history::{FileStore, HistoryCache, KeyValueStore, MemoryStore};
use studio_mini::{AppError, Result};

use crate::support::{entry, ids, HISTORY_KEY};

#[tokio::test]
async fn test_six_records_keep_five_newest() {
    let mut cache = HistoryCache::new(Arc::new(MemoryStore::new()), HISTORY_KEY, 5);
    for id in ["A", "B", "C", "D", "E"] {
        cache.record(entry(id)).await;
    }
    let list = cache.record(entry("F")).await;
    assert_eq!(ids(&list), vec!["F", "E", "D", "C", "B"]);
}

#[tokio::test]
async fn test_rerecord_does_not_grow() {
    let mut cache = HistoryCache::new(Arc::new(MemoryStore::new()), HISTORY_KEY, 5);
    for id in ["A", "B", "C", "D", "E"] {
        cache.record(entry(id)).await;
    }
    let list = cache.record(entry("C")).await;
    assert_eq!(ids(&list), vec!["C", "E", "D", "B", "A"]);
}

#[tokio::test]
async fn test_corrupt_storage_loads_empty() {
    let store = Arc::new(MemoryStore::new());
    let mut cache = HistoryCache::new(store.clone(), HISTORY_KEY, 5);

    for raw in ["{not json", "{\"a\":1}", "42", "\"text\""] {
        store.set(HISTORY_KEY, raw).await.unwrap();
        assert!(cache.load().await.is_empty(), "{}", raw);
    }
}

#[tokio::test]
async fn test_oversized_stored_list_is_truncated() {
    let store = Arc::new(MemoryStore::new());
    let stored: Vec<_> = ["A", "B", "C", "D", "E", "F", "G"].iter().map(|id| entry(id)).collect();
    store
        .set(HISTORY_KEY, &serde_json::to_string(&stored).unwrap())
        .await
        .unwrap();

    let mut cache = HistoryCache::new(store, HISTORY_KEY, 5);
    assert_eq!(ids(&cache.load().await), vec!["A", "B", "C", "D", "E"]);
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let mut cache = HistoryCache::new(Arc::new(FileStore::new(dir.path())), HISTORY_KEY, 5);
    cache.record(entry("A")).await;
    cache.record(entry("B")).await;

    let mut reopened = HistoryCache::new(Arc::new(FileStore::new(dir.path())), HISTORY_KEY, 5);
    assert_eq!(ids(&reopened.load().await), vec!["B", "A"]);

    let raw = std::fs::read_to_string(dir.path().join(format!("{}.json", HISTORY_KEY))).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value[0]["id"], "B");
    assert_eq!(value[0]["style"], "Vintage");
    assert!(value[0]["createdAt"].is_string());
}

/// Fails the first `failures` reads, then behaves like a memory store
struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicUsize,
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(AppError::Internal("storage unavailable".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value).await
    }
}

#[tokio::test]
async fn test_failed_load_then_record_keeps_stored_entries() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        failures: AtomicUsize::new(1),
    });
    let stored = vec![entry("B"), entry("A")];
    store
        .set(HISTORY_KEY, &serde_json::to_string(&stored).unwrap())
        .await
        .unwrap();

    let mut cache = HistoryCache::new(store.clone(), HISTORY_KEY, 5);
    assert!(cache.load().await.is_empty());

    let list = cache.record(entry("C")).await;
    assert_eq!(ids(&list), vec!["C", "B", "A"]);

    let mut reopened = HistoryCache::new(store, HISTORY_KEY, 5);
    assert_eq!(ids(&reopened.load().await), vec!["C", "B", "A"]);
}

#[tokio::test]
async fn test_record_without_load_preserves_file_history() {
    let dir = tempfile::tempdir().unwrap();

    let mut first = HistoryCache::new(Arc::new(FileStore::new(dir.path())), HISTORY_KEY, 5);
    first.record(entry("A")).await;

    let mut second = HistoryCache::new(Arc::new(FileStore::new(dir.path())), HISTORY_KEY, 5);
    assert_eq!(ids(&second.record(entry("B")).await), vec!["B", "A"]);
}
