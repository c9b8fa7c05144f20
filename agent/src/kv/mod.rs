//! Key-value storage abstraction.
//!
//! The queue store persists everything as UTF-8 JSON strings under a small
//! set of keys, so any backend that can get, set, remove and enumerate
//! string keys will do.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

/// Errors raised by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// An asynchronous, durable string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently stored.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Delete several keys as one batch.
    async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError>;
}
