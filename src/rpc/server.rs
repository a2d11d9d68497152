//! JSON-RPC server over stdin/stdout.
//!
//! Implements the JSON-RPC 2.0 protocol for daemon communication. Requests are
//! read one per line and answered in order; logs go to stderr.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::audio::{AudioPlayer, HeadlessBackend};
use crate::cache::storage_from_config;
use crate::config::DaemonConfig;
use crate::error::{Result, WorkerError};
use crate::report::TracingReporter;
use crate::worker::{
    action_store_from_config, HttpActionProcessor, HttpNetwork, OfflineController, SyncBackend,
};

use super::host::NotifyingHost;
use super::methods::handle_request;
use super::types::{
    JsonRpcError, JsonRpcErrorResponse, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};

/// State shared across all request handlers.
pub struct ServerState {
    /// The offline cache controller.
    pub controller: Arc<OfflineController>,
    /// The hover preview player.
    pub player: AudioPlayer,
    /// Flag to signal server shutdown.
    shutdown: Arc<AtomicBool>,
}

impl ServerState {
    /// Creates server state from already-built components.
    pub fn new(controller: Arc<OfflineController>, player: AudioPlayer) -> Self {
        Self {
            controller,
            player,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builds the production stack: HTTP network, configured cache storage,
    /// notification host, headless audio and HTTP action replay.
    ///
    /// A controller whose caches survived a restart resumes as active.
    pub async fn from_config(config: &DaemonConfig) -> Result<Self> {
        let origin = config
            .origin_url()
            .ok_or_else(|| WorkerError::invalid_config(format!("bad origin {}", config.origin)))?;

        let network = HttpNetwork::new(origin.clone(), config.request_timeout())?;
        let processor = HttpActionProcessor::new(origin, config.request_timeout())?;

        let controller = OfflineController::new(
            config,
            storage_from_config(config),
            Arc::new(network),
            Arc::new(NotifyingHost),
        )?
        .with_reporter(Arc::new(TracingReporter))
        .with_sync(SyncBackend {
            store: action_store_from_config(config),
            processor: Arc::new(processor),
        });
        controller.resume().await?;

        let player = AudioPlayer::new(Arc::new(HeadlessBackend::new(config.effective_asset_root())));

        Ok(Self::new(Arc::new(controller), player))
    }

    /// Signals the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns true if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Runs the JSON-RPC server, reading from stdin and writing to stdout.
pub async fn run_server(state: ServerState) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("JSON-RPC server started, waiting for requests...");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error reading stdin: {}", e);
                break;
            }
        };

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = process_request(&line, &state).await {
            write_line(&response);
        }

        if state.is_shutdown() {
            eprintln!("Server shutdown requested");
            break;
        }
    }

    state.player.stop();
    state.player.settle().await;
    state.controller.settle_background_writes().await;

    eprintln!("JSON-RPC server stopped");
    Ok(())
}

/// Processes a single JSON-RPC request line.
pub(crate) async fn process_request(line: &str, state: &ServerState) -> Option<String> {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            let error = JsonRpcErrorResponse::new(
                None,
                JsonRpcError::parse_error(format!("Invalid JSON: {}", e)),
            );
            return Some(serde_json::to_string(&error).unwrap_or_default());
        }
    };

    // Validate JSON-RPC version
    if request.jsonrpc != "2.0" {
        let error = JsonRpcErrorResponse::new(
            Some(request.id),
            JsonRpcError::invalid_request("Invalid JSON-RPC version (expected 2.0)"),
        );
        return Some(serde_json::to_string(&error).unwrap_or_default());
    }

    tracing::debug!(method = %request.method, "rpc request");
    let result = handle_request(&request.method, request.params, state).await;

    match result {
        Ok(value) => {
            Some(serde_json::to_string(&JsonRpcResponse::new(request.id, value)).unwrap_or_default())
        }
        Err(error) => {
            tracing::debug!(method = %request.method, code = error.code, "rpc error");
            Some(
                serde_json::to_string(&JsonRpcErrorResponse::new(Some(request.id), error))
                    .unwrap_or_default(),
            )
        }
    }
}

fn write_line(line: &str) {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line).ok();
    stdout.flush().ok();
}

/// Sends a JSON-RPC notification to stdout.
pub fn send_notification<T: serde::Serialize>(method: &'static str, params: T) {
    let notification = JsonRpcNotification::new(method, params);
    if let Ok(json) = serde_json::to_string(&notification) {
        write_line(&json);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;

    use crate::cache::MemoryCacheStorage;
    use crate::report::MemoryReporter;
    use crate::types::{Request, Response};
    use crate::worker::{
        ActionProcessor, MemoryActionStore, Network, PendingAction, RecordingHost,
    };

    /// Serves every static file plus `/api/persona`; fails everything else.
    pub struct SiteNetwork;

    #[async_trait]
    impl Network for SiteNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            let path = request.url.path();
            let served = crate::config::STATIC_FILES.contains(&path) || path == "/api/persona";
            if served {
                Ok(Response::new(200, format!("asset {}", path)))
            } else {
                Err(WorkerError::network(request.url.as_str(), "offline"))
            }
        }
    }

    /// Accepts every action.
    pub struct AcceptAll;

    #[async_trait]
    impl ActionProcessor for AcceptAll {
        async fn process(&self, _action: &PendingAction) -> Result<()> {
            Ok(())
        }
    }

    /// Server state backed by memory storage, a recording host and a
    /// headless player over an empty asset root.
    pub fn test_state(asset_root: &std::path::Path) -> (ServerState, RecordingHost) {
        let config = DaemonConfig::new();
        let host = RecordingHost::new();
        let controller = OfflineController::new(
            &config,
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(SiteNetwork),
            Arc::new(host.clone()),
        )
        .unwrap()
        .with_reporter(Arc::new(MemoryReporter::new()))
        .with_sync(SyncBackend {
            store: Arc::new(MemoryActionStore::new()),
            processor: Arc::new(AcceptAll),
        });
        let player = AudioPlayer::new(Arc::new(HeadlessBackend::new(asset_root)))
            .with_reporter(Arc::new(MemoryReporter::new()))
            .with_seed(3);
        (
            ServerState::new(Arc::new(controller), player),
            host,
        )
    }
}
