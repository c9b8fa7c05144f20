//! In-memory key-value store.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{KeyValueStore, StorageError};

/// Volatile store backed by a concurrent map.
///
/// Used by tests and by hosts that keep the queue only for the lifetime of
/// the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|value| value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }
}
