//! JSON-file key-value store.
//!
//! Each key lives in its own file named by a hash prefix of the key:
//! `{root}/{sha256(key)[0..16]}.json`, holding `{"key": ..., "value": ...}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::{KeyValueStore, StorageError, StorageResult};

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    value: Value,
}

/// Durable store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.root.join(format!("{}.json", &digest[..16]))
    }

    async fn read_entry(path: &Path) -> StorageResult<Option<StoredEntry>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let path = self.entry_path(key);
        let entry = match Self::read_entry(&path).await {
            Ok(entry) => entry,
            Err(StorageError::Serialization(e)) => {
                warn!("Treating unreadable store entry {} as missing: {}", path.display(), e);
                None
            }
            Err(e) => return Err(e),
        };
        Ok(entry.filter(|e| e.key == key).map(|e| e.value))
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        let entry = StoredEntry {
            key: key.to_string(),
            value,
        };
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&entry)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match Self::read_entry(&path).await {
                Ok(Some(entry)) => keys.push(entry.key),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable store entry {}: {}", path.display(), e),
            }
        }
        keys.sort();
        Ok(keys)
    }
}
