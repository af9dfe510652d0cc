//! URL-keyed parser cache with exact and path-prefix lookup.
//!
//! Listing pages and their paginated variants usually differ only by a query
//! parameter or a trailing path segment, so one generated routine can cover
//! a whole section. Entries are keyed by [`cache_key`]; at most one live
//! entry exists per key, and writing a new routine first removes every entry
//! whose URL is a segment-aligned path prefix of the new one (or vice versa).

mod normalize;

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::ExtractResult;
use crate::models::GeneratedParser;
use crate::storage::{KeyValueStore, StorageError};

pub use normalize::{cache_key, is_segment_prefix, match_path, same_origin, sanitize_key};

const KEY_PREFIX: &str = "parser:";

/// Persistent store of generated extraction routines.
#[derive(Clone)]
pub struct ParserCache {
    store: Arc<dyn KeyValueStore>,
}

impl ParserCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn storage_key(url: &str) -> String {
        format!("{}{}", KEY_PREFIX, cache_key(url))
    }

    /// Store a routine for `url`, superseding overlapping entries first.
    pub async fn put(
        &self,
        url: &str,
        code: &str,
        title: &str,
    ) -> ExtractResult<GeneratedParser> {
        let parser = GeneratedParser::new(code, url, title);

        if let Ok(new_url) = Url::parse(url) {
            for (key, existing) in self.entries().await? {
                let Ok(stored_url) = Url::parse(&existing.source_url) else {
                    continue;
                };
                if !same_origin(&stored_url, &new_url) {
                    continue;
                }
                let stored_path = match_path(&stored_url);
                let new_path = match_path(&new_url);
                if is_segment_prefix(stored_path, new_path)
                    || is_segment_prefix(new_path, stored_path)
                {
                    debug!(
                        "Superseding cached parser for {} (new: {})",
                        existing.source_url, url
                    );
                    self.store.remove(&key).await?;
                }
            }
        }

        let value = serde_json::to_value(&parser).map_err(StorageError::from)?;
        self.store.set(&Self::storage_key(url), value).await?;
        info!("Cached parser for {} ({} bytes)", url, parser.code.len());
        Ok(parser)
    }

    /// Lookup by normalized key only.
    pub async fn get_exact(&self, url: &str) -> ExtractResult<Option<GeneratedParser>> {
        let key = Self::storage_key(url);
        match self.store.get(&key).await? {
            Some(value) => match serde_json::from_value::<GeneratedParser>(value) {
                Ok(parser) => Ok(Some(parser)),
                Err(e) => {
                    warn!("Ignoring corrupt cache entry {}: {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Most specific cached routine whose URL shares scheme and host with
    /// `url` and whose path is a segment-aligned prefix of `url`'s path.
    pub async fn get_by_prefix(&self, url: &str) -> ExtractResult<Option<GeneratedParser>> {
        let Ok(target) = Url::parse(url) else {
            return Ok(None);
        };
        let target_path = match_path(&target);

        let mut candidates: Vec<(usize, GeneratedParser)> = Vec::new();
        for (_, parser) in self.entries().await? {
            let Ok(stored) = Url::parse(&parser.source_url) else {
                continue;
            };
            if !same_origin(&stored, &target) {
                continue;
            }
            let stored_path = match_path(&stored);
            if is_segment_prefix(stored_path, target_path) {
                candidates.push((stored_path.len(), parser));
            }
        }

        candidates.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(candidates.into_iter().next().map(|(_, parser)| parser))
    }

    /// Exact match first, then prefix match.
    pub async fn load(&self, url: &str) -> ExtractResult<Option<GeneratedParser>> {
        if let Some(parser) = self.get_exact(url).await? {
            debug!("Parser cache hit (exact) for {}", url);
            return Ok(Some(parser));
        }
        if let Some(parser) = self.get_by_prefix(url).await? {
            debug!(
                "Parser cache hit (prefix {}) for {}",
                parser.source_url, url
            );
            return Ok(Some(parser));
        }
        debug!("Parser cache miss for {}", url);
        Ok(None)
    }

    /// All readable entries as `(storage key, parser)` pairs.
    pub async fn entries(&self) -> ExtractResult<Vec<(String, GeneratedParser)>> {
        let mut entries = Vec::new();
        for key in self.store.keys().await? {
            if !key.starts_with(KEY_PREFIX) {
                continue;
            }
            let Some(value) = self.store.get(&key).await? else {
                continue;
            };
            match serde_json::from_value::<GeneratedParser>(value) {
                Ok(parser) => entries.push((key, parser)),
                Err(e) => warn!("Ignoring corrupt cache entry {}: {}", key, e),
            }
        }
        Ok(entries)
    }

    /// Remove the entry stored under `url`'s key. Returns whether one existed.
    pub async fn remove(&self, url: &str) -> ExtractResult<bool> {
        let key = Self::storage_key(url);
        let existed = self.store.get(&key).await?.is_some();
        self.store.remove(&key).await?;
        Ok(existed)
    }

    /// Drop every cached routine. Returns how many were removed.
    pub async fn clear(&self) -> ExtractResult<usize> {
        let entries = self.entries().await?;
        for (key, _) in &entries {
            self.store.remove(key).await?;
        }
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn cache() -> ParserCache {
        ParserCache::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_exact_lookup_ignores_www_and_query() {
        let cache = cache();
        cache
            .put("https://www.shop.example/list", "code-a", "List")
            .await
            .unwrap();
        let hit = cache
            .get_exact("https://shop.example/list?page=4")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.code, "code-a");
        assert_eq!(hit.title, "List");
    }

    #[tokio::test]
    async fn test_prefix_lookup_prefers_most_specific() {
        let store = Arc::new(InMemoryStore::new());
        let cache = ParserCache::new(store.clone());
        // Write both directly; put() would supersede one with the other.
        for (url, code) in [
            ("https://shop.example/list", "general"),
            ("https://shop.example/list/shoes", "specific"),
        ] {
            let parser = GeneratedParser::new(code, url, "t");
            store
                .set(
                    &format!("parser:{}", cache_key(url)),
                    serde_json::to_value(&parser).unwrap(),
                )
                .await
                .unwrap();
        }

        let hit = cache
            .get_by_prefix("https://shop.example/list/shoes/running?page=2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.code, "specific");

        let hit = cache
            .get_by_prefix("https://shop.example/list/hats")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.code, "general");
    }

    #[tokio::test]
    async fn test_prefix_lookup_is_segment_aligned_and_origin_bound() {
        let cache = cache();
        cache
            .put("https://shop.example/list", "code", "t")
            .await
            .unwrap();
        assert!(cache
            .get_by_prefix("https://shop.example/listing")
            .await
            .unwrap()
            .is_none());
        assert!(cache
            .get_by_prefix("http://shop.example/list/x")
            .await
            .unwrap()
            .is_none());
        assert!(cache
            .get_by_prefix("https://other.example/list/x")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_put_supersedes_overlapping_entries() {
        let cache = cache();
        cache.put("https://shop.example/list", "old", "t").await.unwrap();
        cache
            .put("https://shop.example/other", "unrelated", "t")
            .await
            .unwrap();
        cache
            .put("https://shop.example/list/shoes", "new", "t")
            .await
            .unwrap();

        let urls: Vec<String> = cache
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|(_, p)| p.source_url)
            .collect();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains(&"https://shop.example/list/shoes".to_string()));
        assert!(urls.contains(&"https://shop.example/other".to_string()));

        // A broader parser supersedes the narrower one too.
        cache.put("https://shop.example/", "root", "t").await.unwrap();
        let entries = cache.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.code, "root");
    }

    #[tokio::test]
    async fn test_load_falls_back_to_prefix() {
        let cache = cache();
        cache.put("https://shop.example/list", "code", "t").await.unwrap();
        let hit = cache
            .load("https://shop.example/list/page/2")
            .await
            .unwrap();
        assert_eq!(hit.map(|p| p.code).as_deref(), Some("code"));
        assert!(cache.load("https://shop.example/cart").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let cache = cache();
        cache.put("https://a.example/x", "1", "t").await.unwrap();
        cache.put("https://b.example/y", "2", "t").await.unwrap();
        assert!(cache.remove("https://a.example/x").await.unwrap());
        assert!(!cache.remove("https://a.example/x").await.unwrap());
        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(cache.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_entry_is_a_miss() {
        use crate::storage::FileStore;
        use sha2::{Digest, Sha256};

        let dir = tempfile::tempdir().unwrap();
        let cache = ParserCache::new(Arc::new(FileStore::open(dir.path()).await.unwrap()));
        cache.put("https://shop.example/list", "code", "t").await.unwrap();
        cache.put("https://other.example/a", "other", "t").await.unwrap();

        let key = format!("{}{}", KEY_PREFIX, cache_key("https://shop.example/list"));
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        tokio::fs::write(dir.path().join(format!("{}.json", &digest[..16])), "{ truncated")
            .await
            .unwrap();

        assert!(cache.load("https://shop.example/list").await.unwrap().is_none());
        assert!(cache.get_exact("https://shop.example/list").await.unwrap().is_none());
        assert_eq!(
            cache.load("https://other.example/a").await.unwrap().map(|p| p.code).as_deref(),
            Some("other")
        );

        // A fresh write replaces the unreadable file.
        cache.put("https://shop.example/list", "fresh", "t").await.unwrap();
        assert_eq!(
            cache.get_exact("https://shop.example/list").await.unwrap().unwrap().code,
            "fresh"
        );
    }
}
