//! The offline cache controller.
//!
//! Owns the lifecycle state and implements every event handler: install,
//! activate, fetch, message, push, notification click and background sync.
//! All handlers take `&self`, so one controller can be shared behind an `Arc`
//! and fetches can interleave freely. The cache storage is the only state
//! fetches share.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{join_all, try_join_all};
use reqwest::Url;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::cache::CacheStorage;
use crate::config::{DaemonConfig, OFFLINE_SHELL, SYNC_TAG};
use crate::error::{Result, WorkerError};
use crate::report::{ErrorReport, ErrorReporter, ReportKind, TracingReporter};
use crate::types::{cache_key, Request, Response};

use super::host::{Network, WorkerHost};
use super::lifecycle::{Transition, WorkerState};
use super::message::WorkerMessage;
use super::notification::{ClickAction, Notification};
use super::sync::{drain_pending, PendingAction, SyncBackend, SyncOutcome};

/// Where a fetch response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Served from a cache, no network.
    Cache,
    /// From the network and copied into the dynamic cache.
    Network,
    /// From the network but not cacheable.
    NetworkUncached,
    /// Network failed; the cached app shell was served.
    OfflineShell,
    /// Network failed; the synthetic 503 was served.
    OfflineFallback,
}

/// What the controller did with a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs the request itself.
    Passthrough,
    Respond {
        response: Response,
        source: ResponseSource,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallOutcome {
    pub state: WorkerState,
    /// Number of static assets stored.
    pub cached: usize,
    /// Whether the host accepted the skip-waiting request.
    pub skip_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateOutcome {
    pub state: WorkerState,
    /// Stale caches removed.
    pub deleted: Vec<String>,
    pub clients_claimed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageOutcome {
    SkipWaiting {
        state: WorkerState,
        #[serde(skip_serializing_if = "Option::is_none")]
        activated: Option<ActivateOutcome>,
    },
    CacheUrls {
        cached: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickOutcome {
    pub action: ClickAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened: Option<String>,
}

/// Snapshot of the controller for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerStatus {
    pub state: WorkerState,
    pub static_cache: String,
    pub dynamic_cache: String,
    /// Every cache currently in storage, in creation order.
    pub caches: Vec<String>,
    pub pending_writes: usize,
}

/// The offline cache controller.
pub struct OfflineController {
    origin: Url,
    static_cache: String,
    dynamic_cache: String,
    static_files: Vec<Url>,
    offline_shell: String,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
    host: Arc<dyn WorkerHost>,
    reporter: Arc<dyn ErrorReporter>,
    sync: Option<SyncBackend>,
    state: Mutex<WorkerState>,
    writes: Mutex<Vec<JoinHandle<()>>>,
}

impl OfflineController {
    /// Creates a controller from configuration and its collaborators.
    ///
    /// Fails with `INVALID_CONFIG` if the origin or a static file path cannot
    /// be resolved.
    pub fn new(
        config: &DaemonConfig,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
        host: Arc<dyn WorkerHost>,
    ) -> Result<Self> {
        let origin = config
            .origin_url()
            .ok_or_else(|| WorkerError::invalid_config(format!("bad origin {}", config.origin)))?;

        let static_files = config
            .static_files
            .iter()
            .map(|path| {
                origin.join(path).map_err(|e| {
                    WorkerError::invalid_config(format!("bad static file {}: {}", path, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let offline_shell = origin
            .join(OFFLINE_SHELL)
            .map(|url| cache_key(&url))
            .map_err(|e| WorkerError::invalid_config(e.to_string()))?;

        Ok(Self {
            origin,
            static_cache: config.static_cache_name(),
            dynamic_cache: config.dynamic_cache_name(),
            static_files,
            offline_shell,
            storage,
            network,
            host,
            reporter: Arc::new(TracingReporter),
            sync: None,
            state: Mutex::new(WorkerState::Uninstalled),
            writes: Mutex::new(Vec::new()),
        })
    }

    /// Replaces the error reporter.
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Enables background sync with the given store and processor.
    pub fn with_sync(mut self, sync: SyncBackend) -> Self {
        self.sync = Some(sync);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn apply(&self, event: Transition) -> Result<WorkerState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let next = state.transition(event)?;
        *state = next;
        Ok(next)
    }

    fn report(&self, kind: ReportKind, error: &WorkerError) -> ErrorReport {
        ErrorReport::from_error(kind, error)
    }

    // ------------------------------------------------------------------
    // install / activate
    // ------------------------------------------------------------------

    /// Precaches every static file. All-or-nothing: any failed fetch fails
    /// the install, which returns the controller to `Uninstalled`.
    pub async fn install(&self) -> Result<InstallOutcome> {
        self.apply(Transition::BeginInstall)?;
        tracing::info!(
            cache = %self.static_cache,
            files = self.static_files.len(),
            "installing: caching static files"
        );

        let cached = match self.precache().await {
            Ok(cached) => cached,
            Err(cause) => {
                self.apply(Transition::InstallFailed)?;
                let err = WorkerError::install_failed(cause);
                self.reporter.report(
                    self.report(ReportKind::Install, &err)
                        .with("cache", self.static_cache.clone()),
                );
                return Err(err);
            }
        };

        let state = self.apply(Transition::InstallSucceeded)?;
        let skip_waiting = self.request_skip_waiting().await;
        tracing::info!(cached, "install complete");

        Ok(InstallOutcome {
            state,
            cached,
            skip_waiting,
        })
    }

    async fn precache(&self) -> Result<usize> {
        self.storage.open(&self.static_cache).await?;
        let responses = fetch_all(self.network.as_ref(), &self.static_files).await?;
        for (url, response) in &responses {
            self.storage
                .put(&self.static_cache, &cache_key(url), response)
                .await?;
        }
        Ok(responses.len())
    }

    async fn request_skip_waiting(&self) -> bool {
        match self.host.skip_waiting().await {
            Ok(()) => true,
            Err(e) => {
                self.reporter.report(
                    self.report(ReportKind::Host, &e)
                        .with("effect", "skip_waiting"),
                );
                false
            }
        }
    }

    /// Deletes every cache that is neither the current static nor dynamic
    /// cache, then claims clients.
    ///
    /// Deletion failures are reported per cache and do not stop activation.
    pub async fn activate(&self) -> Result<ActivateOutcome> {
        self.apply(Transition::BeginActivate)?;
        tracing::info!("activating: removing stale caches");

        let deleted = self.delete_stale_caches().await;
        let state = self.apply(Transition::ActivateCompleted)?;

        let clients_claimed = match self.host.claim_clients().await {
            Ok(()) => true,
            Err(e) => {
                self.reporter.report(
                    self.report(ReportKind::Host, &e)
                        .with("effect", "claim_clients"),
                );
                false
            }
        };

        tracing::info!(deleted = deleted.len(), "activation complete");
        Ok(ActivateOutcome {
            state,
            deleted,
            clients_claimed,
        })
    }

    async fn delete_stale_caches(&self) -> Vec<String> {
        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => {
                self.reporter.report(self.report(ReportKind::Activate, &e));
                return Vec::new();
            }
        };

        let stale: Vec<String> = names
            .into_iter()
            .filter(|name| *name != self.static_cache && *name != self.dynamic_cache)
            .collect();

        let results = join_all(stale.iter().map(|name| self.storage.delete(name))).await;

        let mut deleted = Vec::new();
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(_) => {
                    tracing::debug!(cache = %name, "deleted stale cache");
                    deleted.push(name);
                }
                Err(e) => self.reporter.report(
                    self.report(ReportKind::Activate, &e)
                        .with("cache", name),
                ),
            }
        }
        deleted
    }

    /// Picks up a previous activation from persisted caches.
    ///
    /// An uninstalled controller whose static cache already holds every
    /// manifest entry goes straight to `Active`, with no network traffic.
    /// Any other state is left as is. Returns the resulting state.
    pub async fn resume(&self) -> Result<WorkerState> {
        let state = self.state();
        if state != WorkerState::Uninstalled || !self.storage.has(&self.static_cache).await? {
            return Ok(state);
        }

        let stored = self.storage.entries(&self.static_cache).await?;
        let missing = self
            .static_files
            .iter()
            .filter(|url| !stored.contains(&cache_key(url)))
            .count();
        if missing > 0 {
            tracing::info!(
                cache = %self.static_cache,
                missing,
                "static cache incomplete, install required"
            );
            return Ok(state);
        }

        let state = self.apply(Transition::Resume)?;
        tracing::info!(cache = %self.static_cache, "resumed from persisted static cache");
        Ok(state)
    }

    // ------------------------------------------------------------------
    // fetch
    // ------------------------------------------------------------------

    /// Handles an intercepted fetch: cache first, then network, then the
    /// offline fallback. Never fails.
    pub async fn handle_fetch(&self, request: &Request) -> FetchOutcome {
        if !self.state().can_intercept_fetch() || !request.is_get() || !request.is_http() {
            return FetchOutcome::Passthrough;
        }

        let key = request.cache_key();
        match self.storage.match_any(&key).await {
            Ok(Some(response)) => {
                tracing::debug!(url = %key, "cache hit");
                return FetchOutcome::Respond {
                    response,
                    source: ResponseSource::Cache,
                };
            }
            Ok(None) => {}
            Err(e) => self.reporter.report(
                self.report(ReportKind::Fetch, &e)
                    .with("url", key.clone())
                    .with("stage", "cache_lookup"),
            ),
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                let source = if response.is_cacheable() {
                    self.store_detached(key, response.clone());
                    ResponseSource::Network
                } else {
                    ResponseSource::NetworkUncached
                };
                FetchOutcome::Respond { response, source }
            }
            Err(e) => {
                self.reporter.report(
                    self.report(ReportKind::Fetch, &e)
                        .with("url", key.clone())
                        .with("destination", request.destination.as_str()),
                );
                self.offline_response(request).await
            }
        }
    }

    /// Writes a copy into the dynamic cache without holding up the response.
    fn store_detached(&self, key: String, response: Response) {
        let storage = Arc::clone(&self.storage);
        let reporter = Arc::clone(&self.reporter);
        let cache = self.dynamic_cache.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = storage.put(&cache, &key, &response).await {
                reporter.report(
                    ErrorReport::from_error(ReportKind::CacheWrite, &e)
                        .with("cache", cache)
                        .with("url", key),
                );
            }
        });

        let mut writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
        writes.retain(|h| !h.is_finished());
        writes.push(handle);
    }

    async fn offline_response(&self, request: &Request) -> FetchOutcome {
        if request.destination.is_document() {
            match self.storage.match_any(&self.offline_shell).await {
                Ok(Some(response)) => {
                    return FetchOutcome::Respond {
                        response,
                        source: ResponseSource::OfflineShell,
                    }
                }
                Ok(None) => {
                    tracing::warn!(shell = %self.offline_shell, "offline shell not cached")
                }
                Err(e) => self.reporter.report(
                    self.report(ReportKind::Fetch, &e)
                        .with("url", self.offline_shell.clone())
                        .with("stage", "offline_shell"),
                ),
            }
        }

        FetchOutcome::Respond {
            response: Response::offline(request.url.as_str()),
            source: ResponseSource::OfflineFallback,
        }
    }

    /// Waits for every detached cache write started so far.
    pub async fn settle_background_writes(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut writes = self.writes.lock().unwrap_or_else(PoisonError::into_inner);
            writes.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    fn pending_writes(&self) -> usize {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    // ------------------------------------------------------------------
    // message / push / notification click / sync
    // ------------------------------------------------------------------

    /// Handles a page message.
    pub async fn handle_message(&self, message: WorkerMessage) -> Result<MessageOutcome> {
        match message {
            WorkerMessage::SkipWaiting => {
                self.request_skip_waiting().await;
                let activated = if self.state() == WorkerState::Waiting {
                    Some(self.activate().await?)
                } else {
                    None
                };
                Ok(MessageOutcome::SkipWaiting {
                    state: self.state(),
                    activated,
                })
            }
            WorkerMessage::CacheUrls { urls } => {
                let count = urls.len();
                match self.cache_urls(&urls).await {
                    Ok(cached) => Ok(MessageOutcome::CacheUrls { cached }),
                    Err(e) => {
                        self.reporter.report(
                            self.report(ReportKind::Message, &e)
                                .with("message_type", "CACHE_URLS")
                                .with("urls", count.to_string()),
                        );
                        Err(e)
                    }
                }
            }
        }
    }

    async fn cache_urls(&self, urls: &[String]) -> Result<usize> {
        let resolved = urls
            .iter()
            .map(|u| {
                self.origin
                    .join(u)
                    .map_err(|e| WorkerError::invalid_message(format!("bad url {}: {}", u, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let responses = fetch_all(self.network.as_ref(), &resolved).await?;
        for (url, response) in &responses {
            self.storage
                .put(&self.dynamic_cache, &cache_key(url), response)
                .await?;
        }
        tracing::info!(count = responses.len(), "cached urls on request");
        Ok(responses.len())
    }

    /// Builds the notification for a push and asks the host to show it.
    pub async fn handle_push(&self, payload: Option<&str>) -> Result<Notification> {
        let notification = Notification::for_push(payload);
        if let Err(e) = self.host.show_notification(&notification).await {
            self.reporter.report(
                self.report(ReportKind::Host, &e)
                    .with("effect", "show_notification"),
            );
            return Err(e);
        }
        Ok(notification)
    }

    /// Opens the window that matches the clicked action, if any.
    pub async fn handle_notification_click(&self, action: Option<&str>) -> Result<ClickOutcome> {
        let action = ClickAction::from_action(action);
        let opened = match action.target() {
            Some(url) => {
                if let Err(e) = self.host.open_window(url).await {
                    self.reporter.report(
                        self.report(ReportKind::Host, &e)
                            .with("effect", "open_window")
                            .with("url", url),
                    );
                    return Err(e);
                }
                Some(url.to_string())
            }
            None => None,
        };
        Ok(ClickOutcome { action, opened })
    }

    /// Drains pending offline actions when the tag is the background-sync tag.
    pub async fn handle_sync(&self, tag: &str) -> SyncOutcome {
        if tag != SYNC_TAG {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return SyncOutcome::ignored();
        }
        match &self.sync {
            Some(sync) => {
                drain_pending(
                    sync.store.as_ref(),
                    sync.processor.as_ref(),
                    self.reporter.as_ref(),
                )
                .await
            }
            None => SyncOutcome {
                handled: true,
                ..SyncOutcome::default()
            },
        }
    }

    /// Queues an action for the next background sync.
    /// Returns the number of pending actions.
    pub async fn queue_action(&self, action: PendingAction) -> Result<usize> {
        match &self.sync {
            Some(sync) => sync.store.push(action).await,
            None => Err(WorkerError::sync_action(
                &action.id,
                "background sync is not configured",
            )),
        }
    }

    // ------------------------------------------------------------------
    // maintenance
    // ------------------------------------------------------------------

    /// Deletes every cache in storage.
    pub async fn clear_caches(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if self.storage.delete(&name).await? {
                deleted.push(name);
            }
        }
        tracing::info!(count = deleted.len(), "cleared all caches");
        Ok(deleted)
    }

    pub async fn status(&self) -> Result<ControllerStatus> {
        Ok(ControllerStatus {
            state: self.state(),
            static_cache: self.static_cache.clone(),
            dynamic_cache: self.dynamic_cache.clone(),
            caches: self.storage.keys().await?,
            pending_writes: self.pending_writes(),
        })
    }
}

/// Fetches every URL concurrently. Fails on the first transport error or
/// non-2xx status; results keep the input order.
async fn fetch_all(network: &dyn Network, urls: &[Url]) -> Result<Vec<(Url, Response)>> {
    try_join_all(urls.iter().map(|url| async move {
        let response = network.fetch(&Request::get(url.clone())).await?;
        if !response.ok() {
            return Err(WorkerError::asset_unavailable(url.as_str(), response.status));
        }
        Ok((url.clone(), response))
    }))
    .await
}
