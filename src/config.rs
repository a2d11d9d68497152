//! Daemon configuration module.
//!
//! Contains the runtime configuration for the music-dna daemon: the origin the
//! controller serves, the cache generation, the static asset manifest, storage
//! selection, and paths.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

/// Static files precached at install time.
pub const STATIC_FILES: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/icons/icon-192x192.png",
    "/icons/icon-512x512.png",
    "/screenshots/desktop-home.png",
    "/screenshots/mobile-quiz.png",
];

/// Document served for navigations while offline.
pub const OFFLINE_SHELL: &str = "/index.html";

/// Background sync tag that drains pending offline actions.
pub const SYNC_TAG: &str = "background-sync";

/// File under the cache path holding actions queued for background sync.
pub const PENDING_ACTIONS_FILE: &str = "pending-actions.json";

/// Default origin (the Vite dev server).
pub const DEFAULT_ORIGIN: &str = "http://localhost:5173";

/// Default cache generation.
pub const DEFAULT_CACHE_VERSION: &str = "v1.0.0";

/// Where cache entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// In-process caches, lost on exit.
    Memory,

    /// Caches persisted under the cache path.
    #[default]
    Disk,
}

impl StorageKind {
    /// Returns the string representation of the storage kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::Disk => "disk",
        }
    }

    /// Parses a storage kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Some(StorageKind::Memory),
            "disk" | "file" => Some(StorageKind::Disk),
            _ => None,
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime configuration for the daemon.
///
/// Loaded from environment variables at startup and then overridden by
/// command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Origin the controller serves; same-origin responses are "basic".
    pub origin: String,

    /// Cache generation. Bumping it evicts every older cache on activate.
    pub cache_version: String,

    /// Paths precached into the static cache at install time.
    pub static_files: Vec<String>,

    /// Cache storage backend.
    pub storage: StorageKind,

    /// Directory for disk-backed caches.
    /// If None, uses the platform-specific default cache location.
    pub cache_path: Option<PathBuf>,

    /// Local directory mirroring the site's public assets (audio files).
    /// If None, uses `./public`.
    pub asset_root: Option<PathBuf>,

    /// Timeout for a single network fetch, in seconds.
    pub request_timeout_secs: u64,
}

impl DaemonConfig {
    /// Creates a new DaemonConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a DaemonConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `MUSIC_DNA_ORIGIN` - Origin served by the controller
    /// - `MUSIC_DNA_CACHE_VERSION` - Cache generation suffix
    /// - `MUSIC_DNA_STORAGE` - Storage backend (memory, disk)
    /// - `MUSIC_DNA_CACHE_PATH` - Directory for disk caches
    /// - `MUSIC_DNA_ASSET_ROOT` - Local public asset directory
    /// - `MUSIC_DNA_REQUEST_TIMEOUT` - Fetch timeout in seconds
    ///
    /// Falls back to defaults for unset or unparseable variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(origin) = std::env::var("MUSIC_DNA_ORIGIN") {
            config.origin = origin;
        }

        if let Ok(version) = std::env::var("MUSIC_DNA_CACHE_VERSION") {
            if !version.trim().is_empty() {
                config.cache_version = version.trim().to_string();
            }
        }

        if let Ok(storage_str) = std::env::var("MUSIC_DNA_STORAGE") {
            if let Some(storage) = StorageKind::parse(&storage_str) {
                config.storage = storage;
            }
        }

        if let Ok(path) = std::env::var("MUSIC_DNA_CACHE_PATH") {
            config.cache_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("MUSIC_DNA_ASSET_ROOT") {
            config.asset_root = Some(PathBuf::from(path));
        }

        if let Ok(timeout_str) = std::env::var("MUSIC_DNA_REQUEST_TIMEOUT") {
            if let Ok(timeout) = timeout_str.parse::<u64>() {
                if (1..=300).contains(&timeout) {
                    config.request_timeout_secs = timeout;
                }
            }
        }

        config
    }

    /// Name of the cache holding the precached app shell.
    pub fn static_cache_name(&self) -> String {
        format!("static-{}", self.cache_version)
    }

    /// Name of the cache filled at runtime from network responses.
    pub fn dynamic_cache_name(&self) -> String {
        format!("dynamic-{}", self.cache_version)
    }

    /// Parses the configured origin.
    pub fn origin_url(&self) -> Option<Url> {
        Url::parse(&self.origin).ok()
    }

    /// Returns the fetch timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the effective cache path, using platform defaults if not specified.
    pub fn effective_cache_path(&self) -> PathBuf {
        if let Some(ref path) = self.cache_path {
            path.clone()
        } else {
            default_cache_path()
        }
    }

    /// Returns the file that persists pending offline actions.
    pub fn pending_actions_path(&self) -> PathBuf {
        self.effective_cache_path().join(PENDING_ACTIONS_FILE)
    }

    /// Returns the effective asset root.
    pub fn effective_asset_root(&self) -> PathBuf {
        self.asset_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("./public"))
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        match self.origin_url() {
            None => return Some(format!("origin is not a valid URL: {}", self.origin)),
            Some(url) if url.scheme() != "http" && url.scheme() != "https" => {
                return Some(format!("origin must be http or https: {}", self.origin));
            }
            Some(_) => {}
        }

        if self.cache_version.trim().is_empty() {
            return Some("cache_version must not be empty".to_string());
        }

        if !(1..=300).contains(&self.request_timeout_secs) {
            return Some(format!(
                "request_timeout_secs out of range: {} (1-300)",
                self.request_timeout_secs
            ));
        }

        if !self.static_files.iter().any(|f| f == OFFLINE_SHELL) {
            return Some(format!("static_files must include {}", OFFLINE_SHELL));
        }

        None
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            cache_version: DEFAULT_CACHE_VERSION.to_string(),
            static_files: STATIC_FILES.iter().map(|s| s.to_string()).collect(),
            storage: StorageKind::default(),
            cache_path: None,
            asset_root: None,
            request_timeout_secs: 30,
        }
    }
}

/// Returns the platform-specific default cache storage path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Caches/music-dna/caches
/// - Linux: ~/.cache/music-dna/caches
/// - Windows: C:\Users\<user>\AppData\Local\music-dna\cache\caches
fn default_cache_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "music-dna") {
        proj_dirs.cache_dir().join("caches")
    } else {
        // Fallback to current directory
        PathBuf::from("./caches")
    }
}
