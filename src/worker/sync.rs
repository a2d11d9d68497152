//! Background sync of actions queued while offline.
//!
//! Each pending action is processed on its own: one failing action is reported
//! and stays queued, the rest still go through.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::config::{DaemonConfig, StorageKind};
use crate::error::{ErrorCode, Result, WorkerError};
use crate::report::{ErrorReport, ErrorReporter, ReportKind};

fn default_method() -> String {
    "POST".to_string()
}

/// An action the page recorded while offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    /// Absolute URL, or a path relative to the origin.
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl PendingAction {
    /// Creates an action with a random id.
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: format!("{:016x}", rand::random::<u64>()),
            url: url.into(),
            method: method.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Storage for pending actions.
#[async_trait]
pub trait PendingActionStore: Send + Sync {
    /// Returns pending actions in the order they were queued.
    async fn pending(&self) -> Result<Vec<PendingAction>>;

    /// Queues an action, replacing any action with the same id.
    /// Returns the number of pending actions.
    async fn push(&self, action: PendingAction) -> Result<usize>;

    /// Removes an action once it has been processed.
    async fn remove(&self, id: &str) -> Result<()>;
}

/// Replays one pending action.
#[async_trait]
pub trait ActionProcessor: Send + Sync {
    async fn process(&self, action: &PendingAction) -> Result<()>;
}

/// Pending actions held in memory.
#[derive(Default)]
pub struct MemoryActionStore {
    actions: Mutex<Vec<PendingAction>>,
}

impl MemoryActionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PendingActionStore for MemoryActionStore {
    async fn pending(&self) -> Result<Vec<PendingAction>> {
        Ok(self.actions.lock().await.clone())
    }

    async fn push(&self, action: PendingAction) -> Result<usize> {
        let mut actions = self.actions.lock().await;
        match actions.iter_mut().find(|a| a.id == action.id) {
            Some(existing) => *existing = action,
            None => actions.push(action),
        }
        Ok(actions.len())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.actions.lock().await.retain(|a| a.id != id);
        Ok(())
    }
}

/// Pending actions persisted as a JSON array in a single file.
///
/// Every change rewrites the whole file through a temporary file and a
/// rename, so a crash leaves either the old queue or the new one.
pub struct DiskActionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DiskActionStore {
    /// Creates a store backed by `path`. The file is created on first push.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<PendingAction>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(queue_error("read", &self.path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            WorkerError::with_source(
                ErrorCode::CacheStorageFailed,
                format!("Corrupt action queue at {}", self.path.display()),
                e,
            )
        })
    }

    async fn save(&self, actions: &[PendingAction]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| queue_error("create directory for", &self.path, e))?;
        }

        let bytes = serde_json::to_vec_pretty(actions).map_err(|e| {
            WorkerError::with_source(ErrorCode::CacheStorageFailed, "encode action queue", e)
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| queue_error("write", &tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &self.path).await {
            fs::remove_file(&tmp).await.ok();
            return Err(queue_error("commit", &self.path, e));
        }
        Ok(())
    }
}

#[async_trait]
impl PendingActionStore for DiskActionStore {
    async fn pending(&self) -> Result<Vec<PendingAction>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn push(&self, action: PendingAction) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut actions = self.load().await?;
        match actions.iter_mut().find(|a| a.id == action.id) {
            Some(existing) => *existing = action,
            None => actions.push(action),
        }
        self.save(&actions).await?;
        Ok(actions.len())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut actions = self.load().await?;
        let before = actions.len();
        actions.retain(|a| a.id != id);
        if actions.len() != before {
            self.save(&actions).await?;
        }
        Ok(())
    }
}

fn queue_error(action: &str, path: &Path, e: std::io::Error) -> WorkerError {
    WorkerError::with_source(
        ErrorCode::CacheStorageFailed,
        format!("Failed to {} action queue at {}: {}", action, path.display(), e),
        e,
    )
}

/// Builds the pending-action store matching the configured cache storage.
pub fn action_store_from_config(config: &DaemonConfig) -> Arc<dyn PendingActionStore> {
    match config.storage {
        StorageKind::Memory => Arc::new(MemoryActionStore::new()),
        StorageKind::Disk => Arc::new(DiskActionStore::new(config.pending_actions_path())),
    }
}

/// Replays actions as HTTP requests against the origin.
pub struct HttpActionProcessor {
    client: reqwest::Client,
    origin: Url,
}

impl HttpActionProcessor {
    pub fn new(origin: Url, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WorkerError::with_source(
                    ErrorCode::SyncActionFailed,
                    format!("Failed to create HTTP client: {}", e),
                    e,
                )
            })?;
        Ok(Self { client, origin })
    }

    fn resolve(&self, action: &PendingAction) -> Result<(Method, Url)> {
        let method = Method::from_bytes(action.method.to_uppercase().as_bytes())
            .map_err(|_| WorkerError::sync_action(&action.id, format!("bad method {}", action.method)))?;
        let url = self
            .origin
            .join(&action.url)
            .map_err(|e| WorkerError::sync_action(&action.id, format!("bad url {}: {}", action.url, e)))?;
        Ok((method, url))
    }
}

#[async_trait]
impl ActionProcessor for HttpActionProcessor {
    async fn process(&self, action: &PendingAction) -> Result<()> {
        let (method, url) = self.resolve(action)?;
        let mut request = self.client.request(method, url);
        if let Some(body) = &action.body {
            request = request.json(body);
        }

        let reply = request
            .send()
            .await
            .map_err(|e| WorkerError::sync_action(&action.id, e.to_string()))?;

        if !reply.status().is_success() {
            return Err(WorkerError::sync_action(
                &action.id,
                format!("server returned {}", reply.status()),
            ));
        }
        Ok(())
    }
}

/// Result of one background sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// False when the sync tag was not ours.
    pub handled: bool,
    pub processed: usize,
    pub failed: usize,
    /// Actions still queued after the sync.
    pub remaining: usize,
}

impl SyncOutcome {
    pub fn ignored() -> Self {
        Self::default()
    }
}

/// Processes every pending action, isolating failures per action.
///
/// Processed actions are removed from the store; failed ones stay queued for
/// the next sync. A store that cannot be listed is reported and nothing is
/// processed.
pub async fn drain_pending(
    store: &dyn PendingActionStore,
    processor: &dyn ActionProcessor,
    reporter: &dyn ErrorReporter,
) -> SyncOutcome {
    let mut outcome = SyncOutcome {
        handled: true,
        ..SyncOutcome::default()
    };

    let actions = match store.pending().await {
        Ok(actions) => actions,
        Err(e) => {
            reporter.report(ErrorReport::from_error(ReportKind::Sync, &e));
            return outcome;
        }
    };

    for action in &actions {
        let result = match processor.process(action).await {
            Ok(()) => store.remove(&action.id).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => outcome.processed += 1,
            Err(e) => {
                outcome.failed += 1;
                reporter.report(
                    ErrorReport::from_error(ReportKind::SyncAction, &e)
                        .with("action_id", action.id.clone())
                        .with("url", action.url.clone()),
                );
            }
        }
    }

    outcome.remaining = match store.pending().await {
        Ok(left) => left.len(),
        Err(_) => actions.len() - outcome.processed,
    };

    tracing::info!(
        processed = outcome.processed,
        failed = outcome.failed,
        remaining = outcome.remaining,
        "background sync finished"
    );
    outcome
}

/// Pending-action store and processor used by background sync.
#[derive(Clone)]
pub struct SyncBackend {
    pub store: Arc<dyn PendingActionStore>,
    pub processor: Arc<dyn ActionProcessor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;

    /// Fails every action whose url contains "fail".
    struct ScriptedProcessor;

    #[async_trait]
    impl ActionProcessor for ScriptedProcessor {
        async fn process(&self, action: &PendingAction) -> Result<()> {
            if action.url.contains("fail") {
                Err(WorkerError::sync_action(&action.id, "rejected"))
            } else {
                Ok(())
            }
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl PendingActionStore for BrokenStore {
        async fn pending(&self) -> Result<Vec<PendingAction>> {
            Err(WorkerError::cache_storage("store unavailable"))
        }
        async fn push(&self, _action: PendingAction) -> Result<usize> {
            Ok(0)
        }
        async fn remove(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn action(id: &str, url: &str) -> PendingAction {
        PendingAction {
            id: id.to_string(),
            url: url.to_string(),
            method: default_method(),
            body: None,
        }
    }

    #[tokio::test]
    async fn empty_queue_is_noop() {
        let store = MemoryActionStore::new();
        let reporter = MemoryReporter::new();
        let outcome = drain_pending(&store, &ScriptedProcessor, &reporter).await;
        assert!(outcome.handled);
        assert_eq!(outcome.processed, 0);
        assert!(reporter.reports().is_empty());
    }

    #[tokio::test]
    async fn failure_is_isolated_per_action() {
        let store = MemoryActionStore::new();
        store.push(action("a", "/api/quiz")).await.unwrap();
        store.push(action("b", "/api/fail")).await.unwrap();
        store.push(action("c", "/api/profile")).await.unwrap();
        let reporter = MemoryReporter::new();

        let outcome = drain_pending(&store, &ScriptedProcessor, &reporter).await;

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.remaining, 1);
        assert_eq!(store.pending().await.unwrap()[0].id, "b");

        let reports = reporter.of_kind(ReportKind::SyncAction);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].field("action_id"), Some("b"));
    }

    #[tokio::test]
    async fn unlistable_store_is_reported() {
        let reporter = MemoryReporter::new();
        let outcome = drain_pending(&BrokenStore, &ScriptedProcessor, &reporter).await;
        assert!(outcome.handled);
        assert_eq!(outcome.processed, 0);
        assert_eq!(reporter.of_kind(ReportKind::Sync).len(), 1);
    }

    #[tokio::test]
    async fn push_replaces_same_id() {
        let store = MemoryActionStore::new();
        assert_eq!(store.push(action("a", "/one")).await.unwrap(), 1);
        assert_eq!(store.push(action("a", "/two")).await.unwrap(), 1);
        assert_eq!(store.pending().await.unwrap()[0].url, "/two");
    }

    #[test]
    fn action_defaults_to_post() {
        let a: PendingAction =
            serde_json::from_str(r#"{"id":"x","url":"/api/quiz"}"#).unwrap();
        assert_eq!(a.method, "POST");
        assert!(a.body.is_none());
    }

    #[test]
    fn generated_ids_differ() {
        let a = PendingAction::new("/a", "POST");
        let b = PendingAction::new("/a", "POST");
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 16);
    }

    #[test]
    fn processor_resolves_relative_urls() {
        let processor = HttpActionProcessor::new(
            Url::parse("http://localhost:5173").unwrap(),
            std::time::Duration::from_secs(1),
        )
        .unwrap();
        let (method, url) = processor
            .resolve(&action("a", "/api/quiz"))
            .unwrap();
        assert_eq!(method, Method::POST);
        assert_eq!(url.as_str(), "http://localhost:5173/api/quiz");

        let mut put = action("b", "https://api.example.com/x");
        put.method = "put".to_string();
        let (method, url) = processor.resolve(&put).unwrap();
        assert_eq!(method, Method::PUT);
        assert_eq!(url.host_str(), Some("api.example.com"));
    }

    #[tokio::test]
    async fn disk_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caches").join("pending-actions.json");

        let store = DiskActionStore::new(&path);
        assert!(store.pending().await.unwrap().is_empty());
        store.push(action("a", "/api/quiz")).await.unwrap();
        let with_body = action("b", "/api/profile").with_body(serde_json::json!({"age": "55+"}));
        assert_eq!(store.push(with_body.clone()).await.unwrap(), 2);
        drop(store);

        let reopened = DiskActionStore::new(&path);
        let pending = reopened.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "a");
        assert_eq!(pending[1], with_body);

        reopened.remove("a").await.unwrap();
        let again = DiskActionStore::new(&path);
        assert_eq!(again.pending().await.unwrap(), vec![with_body]);
    }

    #[tokio::test]
    async fn disk_queue_drains_across_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending-actions.json");

        DiskActionStore::new(&path)
            .push(action("a", "/api/quiz"))
            .await
            .unwrap();
        DiskActionStore::new(&path)
            .push(action("b", "/api/fail"))
            .await
            .unwrap();

        let store = DiskActionStore::new(&path);
        let outcome = drain_pending(&store, &ScriptedProcessor, &MemoryReporter::new()).await;
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.remaining, 1);

        let left = DiskActionStore::new(&path).pending().await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "b");
    }

    #[tokio::test]
    async fn corrupt_disk_queue_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending-actions.json");
        std::fs::write(&path, b"[not json").unwrap();

        let err = DiskActionStore::new(&path).pending().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::CacheStorageFailed);
    }

    #[tokio::test]
    async fn store_follows_storage_kind() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DaemonConfig::new();
        config.cache_path = Some(dir.path().to_path_buf());

        action_store_from_config(&config)
            .push(action("a", "/api/quiz"))
            .await
            .unwrap();
        assert!(config.pending_actions_path().exists());
        assert_eq!(
            action_store_from_config(&config).pending().await.unwrap().len(),
            1
        );

        config.storage = StorageKind::Memory;
        assert!(action_store_from_config(&config)
            .pending()
            .await
            .unwrap()
            .is_empty());
    }
}
