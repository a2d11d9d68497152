//! Disk-backed cache storage.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/<hex(cache name)>/.created        creation timestamp (ns since epoch)
//! <root>/<hex(cache name)>/<sha16>.entry   one line of JSON metadata, then the body
//! ```
//!
//! `<sha16>` is the first 16 hex characters of the SHA-256 of the cache key.
//! Entries are written to a temporary file and renamed into place, so readers
//! see either the old entry or the new one, never a partial write.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{ErrorCode, Result, WorkerError};
use crate::types::{Response, ResponseType};

use super::storage::CacheStorage;

const CREATED_MARKER: &str = ".created";
const ENTRY_EXTENSION: &str = "entry";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Response metadata stored ahead of the body in an entry file.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    status_text: String,
    headers: Vec<(String, String)>,
    kind: ResponseType,
    url: Option<String>,
}

/// Cache storage persisted in a directory tree.
#[derive(Debug, Clone)]
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    /// Creates a storage rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        self.root.join(hex::encode(name.as_bytes()))
    }

    async fn ensure_cache(&self, name: &str) -> Result<PathBuf> {
        let dir = self.cache_dir(name);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error("create cache directory", &dir, e))?;

        let marker = dir.join(CREATED_MARKER);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&marker)
            .await
        {
            Ok(mut file) => {
                file.write_all(now_nanos().to_string().as_bytes())
                    .await
                    .map_err(|e| io_error("write creation marker", &marker, e))?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(io_error("create creation marker", &marker, e)),
        }

        Ok(dir)
    }

    async fn created_at(dir: &Path) -> u128 {
        match fs::read_to_string(dir.join(CREATED_MARKER)).await {
            Ok(s) => s.trim().parse().unwrap_or(u128::MAX),
            Err(_) => u128::MAX,
        }
    }

    async fn read_entry(path: &Path) -> Result<Option<(EntryMeta, Vec<u8>)>> {
        let bytes = match fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error("read entry", path, e)),
        };
        decode_entry(&bytes).map(Some).ok_or_else(|| {
            WorkerError::cache_storage(format!("corrupt entry {}", path.display()))
        })
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        self.ensure_cache(name).await.map(|_| ())
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(fs::metadata(self.cache_dir(name))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list caches", &self.root, e)),
        };

        let mut caches = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| io_error("list caches", &self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map_err(|e| io_error("inspect cache", &entry.path(), e))?
                .is_dir();
            if !is_dir {
                continue;
            }
            let path = entry.path();
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| hex::decode(n).ok())
                .and_then(|b| String::from_utf8(b).ok())
            else {
                continue;
            };
            caches.push((Self::created_at(&path).await, name));
        }

        caches.sort();
        Ok(caches.into_iter().map(|(_, name)| name).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let dir = self.cache_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("delete cache", &dir, e)),
        }
    }

    async fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
        let dir = self.ensure_cache(name).await?;
        let path = dir.join(entry_file_name(key));
        let tmp = dir.join(format!(
            ".{}.tmp-{}",
            entry_file_name(key),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let bytes = encode_entry(key, response)?;
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| io_error("write entry", &tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            fs::remove_file(&tmp).await.ok();
            return Err(io_error("commit entry", &path, e));
        }
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &str) -> Result<Option<Response>> {
        let path = self.cache_dir(name).join(entry_file_name(key));
        match Self::read_entry(&path).await? {
            // Different key with the same digest prefix: treat as a miss.
            Some((meta, _)) if meta.key != key => Ok(None),
            Some((meta, body)) => Ok(Some(Response {
                status: meta.status,
                status_text: meta.status_text,
                headers: meta.headers,
                body,
                kind: meta.kind,
                url: meta.url,
            })),
            None => Ok(None),
        }
    }

    async fn entries(&self, name: &str) -> Result<Vec<String>> {
        let cache_dir = self.cache_dir(name);
        let mut dir = match fs::read_dir(&cache_dir).await {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list entries", &cache_dir, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| io_error("list entries", &cache_dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some((meta, _)) = Self::read_entry(&path).await? {
                keys.push(meta.key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// File name for the entry stored under `key`.
pub fn entry_file_name(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{}.{}", hex::encode(&digest[..8]), ENTRY_EXTENSION)
}

fn encode_entry(key: &str, response: &Response) -> Result<Vec<u8>> {
    let meta = EntryMeta {
        key: key.to_string(),
        status: response.status,
        status_text: response.status_text.clone(),
        headers: response.headers.clone(),
        kind: response.kind,
        url: response.url.clone(),
    };
    let mut bytes = serde_json::to_vec(&meta).map_err(|e| {
        WorkerError::with_source(ErrorCode::CacheStorageFailed, "encode entry metadata", e)
    })?;
    bytes.push(b'\n');
    bytes.extend_from_slice(&response.body);
    Ok(bytes)
}

fn decode_entry(bytes: &[u8]) -> Option<(EntryMeta, Vec<u8>)> {
    let split = bytes.iter().position(|&b| b == b'\n')?;
    let meta: EntryMeta = serde_json::from_slice(&bytes[..split]).ok()?;
    Some((meta, bytes[split + 1..].to_vec()))
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> WorkerError {
    WorkerError::with_source(
        ErrorCode::CacheStorageFailed,
        format!("Failed to {} at {}: {}", action, path.display(), e),
        e,
    )
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Response {
        Response::new(200, "<html>shell</html>")
            .with_header("Content-Type", "text/html")
            .with_url("http://localhost:5173/index.html")
    }

    #[test]
    fn entry_file_name_is_stable_hex() {
        let a = entry_file_name("http://localhost:5173/");
        let b = entry_file_name("http://localhost:5173/");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16 + 1 + ENTRY_EXTENSION.len());
        assert!(a[..16].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, entry_file_name("http://localhost:5173/index.html"));
    }

    #[test]
    fn entry_encoding_keeps_binary_body() {
        let mut resp = sample();
        resp.body = vec![0, b'\n', 255, 1];
        let bytes = encode_entry("k", &resp).unwrap();
        let (meta, body) = decode_entry(&bytes).unwrap();
        assert_eq!(meta.key, "k");
        assert_eq!(body, vec![0, b'\n', 255, 1]);
    }

    #[tokio::test]
    async fn missing_root_has_no_caches() {
        let dir = tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path().join("absent"));
        assert!(storage.keys().await.unwrap().is_empty());
        assert!(storage.match_any("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_survives_reopen() {
        let dir = tempdir().unwrap();
        let key = "http://localhost:5173/index.html";

        DiskCacheStorage::new(dir.path())
            .put("static-v1.0.0", key, &sample())
            .await
            .unwrap();

        let reopened = DiskCacheStorage::new(dir.path());
        assert_eq!(reopened.keys().await.unwrap(), vec!["static-v1.0.0"]);
        let hit = reopened.match_in("static-v1.0.0", key).await.unwrap().unwrap();
        assert_eq!(hit, sample());
        assert_eq!(reopened.entries("static-v1.0.0").await.unwrap(), vec![key]);
    }

    #[tokio::test]
    async fn keys_skip_plain_files() {
        let dir = tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        storage.open("static-v1").await.unwrap();
        std::fs::write(dir.path().join("pending-actions.json"), b"[]").unwrap();
        std::fs::write(dir.path().join(hex::encode("not-a-cache")), b"x").unwrap();

        assert_eq!(storage.keys().await.unwrap(), vec!["static-v1"]);
    }

    #[tokio::test]
    async fn keys_follow_creation_order() {
        let dir = tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        storage.open("static-v1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.open("dynamic-v1").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.open("another").await.unwrap();

        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["static-v1", "dynamic-v1", "another"]
        );
    }

    #[tokio::test]
    async fn put_replaces_entry() {
        let dir = tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        storage.put("c", "k", &Response::new(200, "one")).await.unwrap();
        storage.put("c", "k", &Response::new(200, "two")).await.unwrap();

        let hit = storage.match_in("c", "k").await.unwrap().unwrap();
        assert_eq!(hit.body, b"two");
        assert_eq!(storage.entries("c").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_directory() {
        let dir = tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        storage.put("old", "k", &Response::new(200, "x")).await.unwrap();

        assert!(storage.has("old").await.unwrap());
        assert!(storage.delete("old").await.unwrap());
        assert!(!storage.has("old").await.unwrap());
        assert!(!storage.delete("old").await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_entry_is_an_error() {
        let dir = tempdir().unwrap();
        let storage = DiskCacheStorage::new(dir.path());
        storage.open("c").await.unwrap();
        let path = storage.cache_dir("c").join(entry_file_name("k"));
        std::fs::write(&path, b"not json").unwrap();

        let err = storage.match_in("c", "k").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CacheStorageFailed);
    }
}
