//! In-memory cache storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::Response;

use super::storage::CacheStorage;

/// One named cache.
struct NamedCache {
    name: String,
    entries: HashMap<String, Response>,
}

impl NamedCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }
}

/// Cache storage held in process memory. Lost when the daemon exits.
#[derive(Default)]
pub struct MemoryCacheStorage {
    /// Caches in creation order.
    caches: RwLock<Vec<NamedCache>>,
}

impl MemoryCacheStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        let mut caches = self.caches.write().await;
        if !caches.iter().any(|c| c.name == name) {
            caches.push(NamedCache::new(name));
        }
        Ok(())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.caches.read().await.iter().any(|c| c.name == name))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|c| c.name != name);
        Ok(caches.len() != before)
    }

    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
        let mut caches = self.caches.write().await;
        let index = match caches.iter().position(|c| c.name == name) {
            Some(i) => i,
            None => {
                caches.push(NamedCache::new(name));
                caches.len() - 1
            }
        };
        caches[index]
            .entries
            .insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &str) -> Result<Option<Response>> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.entries.get(key).cloned()))
    }

    async fn entries(&self, name: &str) -> Result<Vec<String>> {
        let caches = self.caches.read().await;
        let mut keys: Vec<String> = caches
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn match_any(&self, key: &str) -> Result<Option<Response>> {
        Ok(self
            .caches
            .read()
            .await
            .iter()
            .find_map(|c| c.entries.get(key).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_storage_is_empty() {
        let storage = MemoryCacheStorage::new();
        assert!(storage.keys().await.unwrap().is_empty());
        assert!(!storage.has("static-v1").await.unwrap());
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let storage = MemoryCacheStorage::new();
        storage.open("static-v1").await.unwrap();
        storage.open("static-v1").await.unwrap();
        assert_eq!(storage.keys().await.unwrap(), vec!["static-v1"]);
    }

    #[tokio::test]
    async fn put_and_match() {
        let storage = MemoryCacheStorage::new();
        storage
            .put("dynamic-v1", "http://x/a", &Response::new(200, "a"))
            .await
            .unwrap();

        let hit = storage.match_in("dynamic-v1", "http://x/a").await.unwrap();
        assert_eq!(hit.unwrap().body, b"a");
        assert!(storage.match_in("static-v1", "http://x/a").await.unwrap().is_none());
        assert!(storage.match_any("http://x/a").await.unwrap().is_some());
        assert!(storage.match_any("http://x/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn match_any_prefers_older_cache() {
        let storage = MemoryCacheStorage::new();
        storage.open("static-v1").await.unwrap();
        storage.open("dynamic-v1").await.unwrap();
        storage
            .put("dynamic-v1", "k", &Response::new(200, "dynamic"))
            .await
            .unwrap();
        storage
            .put("static-v1", "k", &Response::new(200, "static"))
            .await
            .unwrap();

        let hit = storage.match_any("k").await.unwrap().unwrap();
        assert_eq!(hit.body, b"static");
    }

    #[tokio::test]
    async fn delete_removes_cache_and_entries() {
        let storage = MemoryCacheStorage::new();
        storage.put("old", "k", &Response::new(200, "x")).await.unwrap();

        assert!(storage.delete("old").await.unwrap());
        assert!(!storage.delete("old").await.unwrap());
        assert!(storage.match_any("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_lists_keys() {
        let storage = MemoryCacheStorage::new();
        storage.put("c", "b", &Response::new(200, "")).await.unwrap();
        storage.put("c", "a", &Response::new(200, "")).await.unwrap();
        assert_eq!(storage.entries("c").await.unwrap(), vec!["a", "b"]);
        assert!(storage.entries("missing").await.unwrap().is_empty());
    }
}
