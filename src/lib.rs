//! music-dna-daemon: offline cache controller and hover audio player for the
//! Canadian Music DNA site.
//!
//! The library provides the pieces the daemon binary wires together:
//! an offline controller that answers page fetches cache-first, and a
//! single-voice audio player for dashboard hover previews.
//!
//! # Modules
//!
//! - [`worker`]: Offline controller (lifecycle, fetch strategy, messages,
//!   push notifications, background sync)
//! - [`cache`]: Named cache storage (memory and disk backends)
//! - [`audio`]: Preview catalog and the hover player
//! - [`types`]: Request and response types
//! - [`config`]: Runtime configuration (DaemonConfig, StorageKind)
//! - [`error`]: Error types and codes (WorkerError, ErrorCode)
//! - [`report`]: Error reporting sink
//! - [`rpc`]: JSON-RPC server over stdio
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use music_dna_daemon::{
//!     cache::MemoryCacheStorage,
//!     config::DaemonConfig,
//!     worker::{HttpNetwork, OfflineController, RecordingHost},
//! };
//!
//! let config = DaemonConfig::new();
//! let network = HttpNetwork::new(config.origin_url().unwrap(), config.request_timeout())?;
//! let controller = OfflineController::new(
//!     &config,
//!     Arc::new(MemoryCacheStorage::new()),
//!     Arc::new(network),
//!     Arc::new(RecordingHost::new()),
//! )?;
//!
//! controller.install().await?;
//! controller.activate().await?;
//! ```

pub mod audio;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod report;
pub mod rpc;
pub mod types;
pub mod worker;

// Re-export commonly used types at crate root for convenience
pub use audio::{AudioPlayer, PlayOutcome};
pub use cache::CacheStorage;
pub use config::{DaemonConfig, StorageKind};
pub use error::{ErrorCode, Result, WorkerError};
pub use types::{Request, Response};
pub use worker::{FetchOutcome, OfflineController, WorkerState};
