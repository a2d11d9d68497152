//! Cache storage abstraction.
//!
//! A storage holds named caches; each cache maps a request key (absolute URL
//! without fragment) to a buffered response. Implementations must make `put`,
//! `match_in` and `delete` atomic per key, since concurrent fetch handlers share
//! one storage without further locking.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Response;

/// Named-cache storage shared by the controller's event handlers.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Opens a named cache, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<()>;

    /// Returns true if a cache with this name exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Returns every cache name, in creation order.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Deletes a named cache. Returns true if it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Stores a response under `key` in the named cache, creating the cache
    /// if needed and replacing any previous entry.
    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<()>;

    /// Looks up `key` in one named cache.
    async fn match_in(&self, name: &str, key: &str) -> Result<Option<Response>>;

    /// Returns the keys stored in one named cache.
    async fn entries(&self, name: &str) -> Result<Vec<String>>;

    /// Looks up `key` across all caches in creation order.
    async fn match_any(&self, key: &str) -> Result<Option<Response>> {
        for name in self.keys().await? {
            if let Some(response) = self.match_in(&name, key).await? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
