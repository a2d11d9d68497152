//! Cache storage for the offline controller.
//!
//! Provides the [`CacheStorage`] trait plus in-memory and on-disk backends.

pub mod disk;
pub mod memory;
pub mod storage;

use std::sync::Arc;

use crate::config::{DaemonConfig, StorageKind};

// Re-export commonly used types
pub use disk::DiskCacheStorage;
pub use memory::MemoryCacheStorage;
pub use storage::CacheStorage;

/// Builds the storage backend selected by the configuration.
pub fn storage_from_config(config: &DaemonConfig) -> Arc<dyn CacheStorage> {
    match config.storage {
        StorageKind::Memory => Arc::new(MemoryCacheStorage::new()),
        StorageKind::Disk => Arc::new(DiskCacheStorage::new(config.effective_cache_path())),
    }
}
