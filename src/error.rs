//! Error types for the music-dna daemon.
//!
//! Defines the error codes shared by the offline cache controller, the audio
//! player and the JSON-RPC layer, so every failure carries a stable code and a
//! recovery hint.

use std::fmt;

/// Error codes attached to every [`WorkerError`].
///
/// These codes are surfaced in JSON-RPC error responses and in structured
/// error reports so callers can handle specific conditions programmatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// A cache storage operation failed.
    /// Trigger: disk I/O error, corrupt entry metadata.
    CacheStorageFailed,

    /// A network fetch could not complete.
    /// Trigger: offline, DNS failure, connection refused, timeout.
    NetworkFailed,

    /// A fetched asset came back with a non-success status.
    /// Trigger: 404 for a manifest URL during install or prefetch.
    AssetUnavailable,

    /// The install step did not complete.
    /// Trigger: any static asset failed to fetch or store.
    InstallFailed,

    /// A lifecycle event arrived in a state that cannot accept it.
    /// Trigger: activate before install, install while already active.
    InvalidState,

    /// A page message could not be understood.
    /// Trigger: unknown message type, missing `urls` list.
    InvalidMessage,

    /// A pending offline action could not be processed.
    /// Trigger: replay request failed or was rejected by the server.
    SyncActionFailed,

    /// The host refused a requested effect.
    /// Trigger: notification display or window open failed.
    HostFailed,

    /// An audio asset could not be loaded.
    /// Trigger: missing file, unreadable file.
    AudioLoadFailed,

    /// Audio playback could not start.
    /// Trigger: autoplay policy, resource released before start.
    AudioPlaybackFailed,

    /// The configuration is invalid.
    /// Trigger: non-http origin, empty cache version, bad timeout.
    InvalidConfig,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::CacheStorageFailed => "CACHE_STORAGE_FAILED",
            ErrorCode::NetworkFailed => "NETWORK_FAILED",
            ErrorCode::AssetUnavailable => "ASSET_UNAVAILABLE",
            ErrorCode::InstallFailed => "INSTALL_FAILED",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::InvalidMessage => "INVALID_MESSAGE",
            ErrorCode::SyncActionFailed => "SYNC_ACTION_FAILED",
            ErrorCode::HostFailed => "HOST_FAILED",
            ErrorCode::AudioLoadFailed => "AUDIO_LOAD_FAILED",
            ErrorCode::AudioPlaybackFailed => "AUDIO_PLAYBACK_FAILED",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::CacheStorageFailed => "A cache storage operation failed",
            ErrorCode::NetworkFailed => "The network request could not complete",
            ErrorCode::AssetUnavailable => "The requested asset returned a non-success status",
            ErrorCode::InstallFailed => "Static assets could not be cached during install",
            ErrorCode::InvalidState => "The controller is not in a state that accepts this event",
            ErrorCode::InvalidMessage => "The page message was not recognized",
            ErrorCode::SyncActionFailed => "A pending offline action could not be processed",
            ErrorCode::HostFailed => "The host could not perform the requested effect",
            ErrorCode::AudioLoadFailed => "The audio asset could not be loaded",
            ErrorCode::AudioPlaybackFailed => "Audio playback could not start",
            ErrorCode::InvalidConfig => "The daemon configuration is invalid",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::CacheStorageFailed => {
                "Check free disk space and permissions on the cache directory, \
                 or run with MUSIC_DNA_STORAGE=memory"
            }
            ErrorCode::NetworkFailed => {
                "Check the network connection and that MUSIC_DNA_ORIGIN points at a running server"
            }
            ErrorCode::AssetUnavailable => {
                "Verify the asset exists on the origin server and the manifest path is spelled correctly"
            }
            ErrorCode::InstallFailed => {
                "Make sure every static manifest URL is reachable, then send install again"
            }
            ErrorCode::InvalidState => {
                "Send lifecycle events in order: install, then activate, then fetch"
            }
            ErrorCode::InvalidMessage => {
                "Send {\"type\":\"SKIP_WAITING\"} or {\"type\":\"CACHE_URLS\",\"urls\":[...]}"
            }
            ErrorCode::SyncActionFailed => {
                "The action stays queued and will be retried on the next background sync"
            }
            ErrorCode::HostFailed => "Check that the host process is reading daemon notifications",
            ErrorCode::AudioLoadFailed => {
                "Check that the audio file exists under MUSIC_DNA_ASSET_ROOT"
            }
            ErrorCode::AudioPlaybackFailed => {
                "Trigger playback again from a user interaction"
            }
            ErrorCode::InvalidConfig => {
                "Fix the offending MUSIC_DNA_* environment variable or command-line flag"
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for controller and player operations.
#[derive(Debug)]
pub struct WorkerError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl WorkerError {
    /// Creates a new WorkerError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new WorkerError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a CACHE_STORAGE_FAILED error.
    pub fn cache_storage(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::CacheStorageFailed,
            format!("Cache storage failed: {}", reason.into()),
        )
    }

    /// Creates a NETWORK_FAILED error.
    pub fn network(url: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::NetworkFailed,
            format!("Fetch of {} failed: {}", url, reason.into()),
        )
    }

    /// Creates an ASSET_UNAVAILABLE error.
    pub fn asset_unavailable(url: &str, status: u16) -> Self {
        Self::new(
            ErrorCode::AssetUnavailable,
            format!("Asset {} returned status {}", url, status),
        )
    }

    /// Creates an INSTALL_FAILED error wrapping the failing step.
    pub fn install_failed(cause: WorkerError) -> Self {
        Self::with_source(
            ErrorCode::InstallFailed,
            format!("Install failed: {}", cause.message),
            cause,
        )
    }

    /// Creates an INVALID_STATE error.
    pub fn invalid_state(event: &str, state: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidState,
            format!("Cannot handle {} while {}", event, state),
        )
    }

    /// Creates an INVALID_MESSAGE error.
    pub fn invalid_message(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidMessage,
            format!("Invalid message: {}", reason.into()),
        )
    }

    /// Creates a SYNC_ACTION_FAILED error.
    pub fn sync_action(id: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::SyncActionFailed,
            format!("Offline action {} failed: {}", id, reason.into()),
        )
    }

    /// Creates a HOST_FAILED error.
    pub fn host(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::HostFailed,
            format!("Host effect failed: {}", reason.into()),
        )
    }

    /// Creates an AUDIO_LOAD_FAILED error.
    pub fn audio_load(path: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::AudioLoadFailed,
            format!("Failed to load audio {}: {}", path, reason.into()),
        )
    }

    /// Creates an AUDIO_PLAYBACK_FAILED error.
    pub fn audio_playback(path: &str, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::AudioPlaybackFailed,
            format!("Playback of {} failed: {}", path, reason.into()),
        )
    }

    /// Creates an INVALID_CONFIG error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidConfig,
            format!("Invalid configuration: {}", reason.into()),
        )
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(e: std::io::Error) -> Self {
        Self::with_source(ErrorCode::CacheStorageFailed, e.to_string(), e)
    }
}

/// Result type alias using WorkerError.
pub type Result<T> = std::result::Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_as_str() {
        assert_eq!(ErrorCode::CacheStorageFailed.as_str(), "CACHE_STORAGE_FAILED");
        assert_eq!(ErrorCode::NetworkFailed.as_str(), "NETWORK_FAILED");
        assert_eq!(ErrorCode::InstallFailed.as_str(), "INSTALL_FAILED");
        assert_eq!(ErrorCode::InvalidState.as_str(), "INVALID_STATE");
        assert_eq!(ErrorCode::AudioLoadFailed.as_str(), "AUDIO_LOAD_FAILED");
    }

    #[test]
    fn error_code_recovery_hints_not_empty() {
        let codes = [
            ErrorCode::CacheStorageFailed,
            ErrorCode::NetworkFailed,
            ErrorCode::AssetUnavailable,
            ErrorCode::InstallFailed,
            ErrorCode::InvalidState,
            ErrorCode::InvalidMessage,
            ErrorCode::SyncActionFailed,
            ErrorCode::HostFailed,
            ErrorCode::AudioLoadFailed,
            ErrorCode::AudioPlaybackFailed,
            ErrorCode::InvalidConfig,
        ];
        for code in codes {
            assert!(!code.recovery_hint().is_empty(), "{} has no hint", code);
            assert!(!code.description().is_empty(), "{} has no description", code);
        }
    }

    #[test]
    fn worker_error_display() {
        let err = WorkerError::asset_unavailable("http://localhost/icon.png", 404);
        let text = err.to_string();
        assert!(text.contains("ASSET_UNAVAILABLE"));
        assert!(text.contains("404"));
        assert!(text.contains("Recovery:"));
    }

    #[test]
    fn install_failed_keeps_cause() {
        use std::error::Error;

        let cause = WorkerError::network("http://localhost/", "connection refused");
        let err = WorkerError::install_failed(cause);
        assert_eq!(err.code, ErrorCode::InstallFailed);
        assert!(err.message.contains("connection refused"));
        assert!(err.source().is_some());
    }
}
