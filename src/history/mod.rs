//! History module - recent generations and their storage

pub mod cache;
pub mod store;

pub use cache::{parse_entries, push_front_unique, HistoryCache, HistoryEntry, RestoredWork};
pub use store::{FileStore, KeyValueStore, MemoryStore};
