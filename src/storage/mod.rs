//! Pluggable key-value storage for persisted records.
//!
//! The parser cache only needs get/set/remove plus a key listing, so any
//! durable map can back it: in-memory for tests and one-shot runs, JSON
//! files on disk for the CLI.

mod file;
mod memory;

use async_trait::async_trait;
use serde_json::Value;

pub use file::FileStore;
pub use memory::InMemoryStore;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors from storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for key-value storage backends.
///
/// Implementations must be thread-safe; values are arbitrary JSON.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// List all stored keys.
    async fn keys(&self) -> StorageResult<Vec<String>>;
}
