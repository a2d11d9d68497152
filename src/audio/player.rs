//! Hover-driven audio player.
//!
//! Plays one looping preview at a time, keyed by discovery method and age
//! group. Hovering a new key swaps the preview; leaving stops it. Failures
//! never escape [`AudioPlayer::play`] or [`AudioPlayer::stop`]: they are
//! reported and the player ends up stopped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::WorkerError;
use crate::report::{ErrorReport, ErrorReporter, ReportKind, TracingReporter};

use super::catalog::{self, AgeGroup, DiscoveryMethod, Track};
use super::media::{same_resource, MediaBackend, MediaResource, PlaybackSettings};

/// Key of the preview that is playing. Known age groups are stored in
/// canonical form; anything else is kept trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlayKey {
    method: DiscoveryMethod,
    age_group: String,
}

impl PlayKey {
    fn new(method: DiscoveryMethod, age_group: &str) -> Self {
        let age_group = match AgeGroup::parse(age_group) {
            Some(age) => age.as_str().to_string(),
            None => age_group.trim().to_string(),
        };
        Self { method, age_group }
    }
}

#[derive(Default)]
struct Session {
    resource: Option<Arc<dyn MediaResource>>,
    key: Option<PlayKey>,
    track: Option<Track>,
}

impl Session {
    /// Clears the session and returns the resource it owned.
    fn take(&mut self) -> Option<Arc<dyn MediaResource>> {
        self.key = None;
        self.track = None;
        self.resource.take()
    }
}

/// Result of a play request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlayOutcome {
    /// The same key already owns a resource; nothing changed.
    AlreadyPlaying { track: Track },
    /// A new resource was created and will start when ready.
    Started { track: Track },
    /// The method is not in the catalog; nothing changed.
    Unresolved,
    /// The resource could not be created; the player is stopped.
    Failed { path: String },
}

/// Snapshot of the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioStatus {
    pub playing: bool,
    pub method: Option<String>,
    pub age_group: Option<String>,
    pub track: Option<Track>,
}

/// Single-preview audio player.
pub struct AudioPlayer {
    backend: Arc<dyn MediaBackend>,
    reporter: Arc<dyn ErrorReporter>,
    settings: PlaybackSettings,
    session: Arc<Mutex<Session>>,
    rng: Mutex<ChaCha8Rng>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AudioPlayer {
    /// Creates a player on the given backend.
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            reporter: Arc::new(TracingReporter),
            settings: PlaybackSettings::default(),
            session: Arc::new(Mutex::new(Session::default())),
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Seeds the generator used for the unknown-age-group fallback.
    pub fn with_seed(self, seed: u64) -> Self {
        *lock(&self.rng) = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Plays the preview for a method and age group.
    ///
    /// Playback starts from a task that waits for the resource to become
    /// ready, so this needs a tokio runtime; without one the request fails
    /// and the player is stopped.
    pub fn play(&self, method: &str, age_group: &str) -> PlayOutcome {
        let Some(parsed) = DiscoveryMethod::parse(method) else {
            tracing::warn!(method, age_group, "no audio for discovery method");
            return PlayOutcome::Unresolved;
        };
        let key = PlayKey::new(parsed, age_group);

        let session = lock(&self.session);
        if session.resource.is_some() && session.key.as_ref() == Some(&key) {
            if let Some(track) = session.track.clone() {
                return PlayOutcome::AlreadyPlaying { track };
            }
        }

        let track = match catalog::resolve(method, age_group, &mut *lock(&self.rng)) {
            Some(track) => track,
            None => return PlayOutcome::Unresolved,
        };
        if track.fallback {
            tracing::warn!(method, age_group, path = %track.path, "unknown age group, using random variant");
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                let err = WorkerError::audio_playback(&track.path, format!("no async runtime: {}", e));
                return self.abort(session, ReportKind::AudioPlayback, &err, track);
            }
        };

        let resource = match self.backend.create(&track.path, self.settings) {
            Ok(resource) => resource,
            Err(e) => return self.abort(session, ReportKind::AudioLoad, &e, track),
        };

        let mut session = session;
        let old = session.resource.replace(Arc::clone(&resource));
        session.key = Some(key);
        session.track = Some(track.clone());
        drop(session);

        if let Some(old) = old {
            teardown(old.as_ref(), self.reporter.as_ref());
        }

        tracing::info!(path = %track.path, title = track.title, "loading preview");
        self.spawn_start(&runtime, resource);
        PlayOutcome::Started { track }
    }

    /// Reports a failed play request and leaves the player stopped.
    fn abort(
        &self,
        mut session: MutexGuard<'_, Session>,
        kind: ReportKind,
        error: &WorkerError,
        track: Track,
    ) -> PlayOutcome {
        report_failure(self.reporter.as_ref(), kind, error, &track.path);
        let old = session.take();
        drop(session);
        if let Some(old) = old {
            teardown(old.as_ref(), self.reporter.as_ref());
        }
        PlayOutcome::Failed { path: track.path }
    }

    /// Waits for the resource and starts it if it is still the owned one.
    fn spawn_start(&self, runtime: &Handle, resource: Arc<dyn MediaResource>) {
        let session = Arc::clone(&self.session);
        let reporter = Arc::clone(&self.reporter);

        let handle = runtime.spawn(async move {
            let loaded = resource.ready().await;

            let mut guard = lock(&session);
            let owned = guard
                .resource
                .as_ref()
                .is_some_and(|r| same_resource(r, &resource));
            if !owned {
                return;
            }

            let failure = match loaded {
                Ok(()) => resource
                    .play()
                    .err()
                    .map(|e| (ReportKind::AudioPlayback, e)),
                Err(e) => Some((ReportKind::AudioLoad, e)),
            };

            if let Some((kind, e)) = failure {
                report_failure(reporter.as_ref(), kind, &e, resource.path());
                guard.take();
                drop(guard);
                teardown(resource.as_ref(), reporter.as_ref());
            }
        });

        let mut tasks = lock(&self.tasks);
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Stops playback and releases the resource. Safe to call at any time.
    pub fn stop(&self) {
        let old = lock(&self.session).take();
        if let Some(old) = old {
            teardown(old.as_ref(), self.reporter.as_ref());
            tracing::info!(path = old.path(), "preview stopped");
        }
    }

    /// Display name of the method playing, if any.
    pub fn current_method(&self) -> Option<String> {
        lock(&self.session)
            .key
            .as_ref()
            .map(|k| k.method.display_name().to_string())
    }

    /// The catalog entry playing, if any.
    pub fn current_track(&self) -> Option<Track> {
        lock(&self.session).track.clone()
    }

    /// True if a resource is owned and not paused.
    pub fn is_playing(&self) -> bool {
        lock(&self.session)
            .resource
            .as_ref()
            .is_some_and(|r| !r.is_paused())
    }

    pub fn status(&self) -> AudioStatus {
        let session = lock(&self.session);
        AudioStatus {
            playing: session.resource.as_ref().is_some_and(|r| !r.is_paused()),
            method: session
                .key
                .as_ref()
                .map(|k| k.method.display_name().to_string()),
            age_group: session.key.as_ref().map(|k| k.age_group.clone()),
            track: session.track.clone(),
        }
    }

    /// Waits until every pending start task has finished.
    pub async fn settle(&self) {
        let handles: Vec<JoinHandle<()>> = lock(&self.tasks).drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn report_failure(reporter: &dyn ErrorReporter, kind: ReportKind, error: &WorkerError, path: &str) {
    reporter.report(ErrorReport::from_error(kind, error).with("path", path));
}

/// Pauses, rewinds and releases a resource. Release failures are reported
/// and swallowed.
fn teardown(resource: &dyn MediaResource, reporter: &dyn ErrorReporter) {
    if resource.has_loaded_data() {
        resource.pause();
        resource.rewind();
    }
    if let Err(e) = resource.release() {
        report_failure(reporter, ReportKind::AudioTeardown, &e, resource.path());
    }
}
