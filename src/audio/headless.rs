//! Headless media backend.
//!
//! Loads asset bytes from the asset root and keeps a playback clock, without
//! producing sound. This is the backend the daemon runs with.

use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{Result, WorkerError};

use super::media::{MediaBackend, MediaResource, PlaybackSettings};

#[derive(Debug, Clone, PartialEq)]
enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Debug, Default)]
struct Playback {
    buffer: Option<Vec<u8>>,
    started_at: Option<Instant>,
    offset: Duration,
    released: bool,
}

impl Playback {
    fn position(&self) -> Duration {
        match self.started_at {
            Some(start) => self.offset + start.elapsed(),
            None => self.offset,
        }
    }
}

/// A resource whose bytes were read from disk.
pub struct HeadlessResource {
    path: String,
    settings: PlaybackSettings,
    load: watch::Receiver<LoadState>,
    playback: Mutex<Playback>,
}

impl HeadlessResource {
    fn playback(&self) -> std::sync::MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, bytes: Vec<u8>) {
        let mut playback = self.playback();
        if !playback.released {
            playback.buffer = Some(bytes);
        }
    }
}

#[async_trait]
impl MediaResource for HeadlessResource {
    fn path(&self) -> &str {
        &self.path
    }

    async fn ready(&self) -> Result<()> {
        let mut load = self.load.clone();
        let state = load
            .wait_for(|s| *s != LoadState::Loading)
            .await
            .map_err(|_| WorkerError::audio_load(&self.path, "loader stopped"))?
            .clone();

        match state {
            LoadState::Failed(reason) => Err(WorkerError::audio_load(&self.path, reason)),
            _ => Ok(()),
        }
    }

    fn play(&self) -> Result<()> {
        let mut playback = self.playback();
        if playback.released {
            return Err(WorkerError::audio_playback(&self.path, "resource released"));
        }
        if playback.buffer.is_none() {
            return Err(WorkerError::audio_playback(&self.path, "no media loaded"));
        }
        if playback.started_at.is_none() {
            playback.started_at = Some(Instant::now());
        }
        tracing::debug!(path = %self.path, volume = self.settings.volume, "playback started");
        Ok(())
    }

    fn pause(&self) {
        let mut playback = self.playback();
        if let Some(start) = playback.started_at.take() {
            playback.offset += start.elapsed();
            tracing::debug!(path = %self.path, position = ?playback.offset, "playback paused");
        }
    }

    fn rewind(&self) {
        let mut playback = self.playback();
        playback.offset = Duration::ZERO;
        if playback.started_at.is_some() {
            playback.started_at = Some(Instant::now());
        }
    }

    fn is_paused(&self) -> bool {
        self.playback().started_at.is_none()
    }

    fn has_loaded_data(&self) -> bool {
        self.playback().buffer.is_some()
    }

    fn release(&self) -> Result<()> {
        let mut playback = self.playback();
        if !playback.released {
            tracing::debug!(path = %self.path, played = ?playback.position(), "resource released");
        }
        playback.buffer = None;
        playback.started_at = None;
        playback.released = true;
        Ok(())
    }
}

/// Backend that reads assets from a directory.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    root: PathBuf,
}

impl HeadlessBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps an asset path such as `/audio/x.mp3` onto the asset root.
    /// Paths that climb out of the root are rejected.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(WorkerError::audio_load(path, "path escapes the asset root"));
        }
        Ok(self.root.join(relative))
    }
}

impl MediaBackend for HeadlessBackend {
    fn create(&self, path: &str, settings: PlaybackSettings) -> Result<Arc<dyn MediaResource>> {
        let file = self.resolve(path)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WorkerError::audio_load(path, format!("no async runtime: {}", e)))?;

        tracing::debug!(
            path,
            volume = settings.volume,
            looping = settings.looping,
            preload = settings.preload,
            "creating headless resource"
        );

        let (tx, rx) = watch::channel(LoadState::Loading);
        let resource = Arc::new(HeadlessResource {
            path: path.to_string(),
            settings,
            load: rx,
            playback: Mutex::new(Playback::default()),
        });

        let weak = Arc::downgrade(&resource);
        runtime.spawn(async move {
            let state = match tokio::fs::read(&file).await {
                Ok(bytes) => {
                    tracing::debug!(file = %file.display(), bytes = bytes.len(), "audio loaded");
                    if let Some(resource) = weak.upgrade() {
                        resource.store(bytes);
                    }
                    LoadState::Ready
                }
                Err(e) => LoadState::Failed(format!("{}: {}", file.display(), e)),
            };
            let _ = tx.send(state);
        });

        Ok(resource)
    }
}

#[cfg(test)]
impl HeadlessResource {
    fn position(&self) -> Duration {
        self.playback().position()
    }

    fn buffered_bytes(&self) -> usize {
        self.playback().buffer.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn backend_with(file: &str, bytes: &[u8]) -> (tempfile::TempDir, HeadlessBackend) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(file.trim_start_matches('/'));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        let backend = HeadlessBackend::new(dir.path());
        (dir, backend)
    }

    #[test]
    fn resolve_maps_under_root() {
        let backend = HeadlessBackend::new("/srv/public");
        assert_eq!(
            backend.resolve("/audio/dashboard-playlist/radio-2.mp3").unwrap(),
            PathBuf::from("/srv/public/audio/dashboard-playlist/radio-2.mp3")
        );
        let err = backend.resolve("/audio/../../etc/passwd").unwrap_err();
        assert_eq!(err.code, ErrorCode::AudioLoadFailed);
    }

    #[tokio::test]
    async fn loads_and_plays() {
        let (_dir, backend) = backend_with("/audio/a.mp3", b"ID3 fake mp3");
        let resource = backend
            .create("/audio/a.mp3", PlaybackSettings::default())
            .unwrap();

        resource.ready().await.unwrap();
        assert!(resource.has_loaded_data());
        assert!(resource.is_paused());

        resource.play().unwrap();
        assert!(!resource.is_paused());

        resource.pause();
        resource.rewind();
        assert!(resource.is_paused());
    }

    #[tokio::test]
    async fn missing_file_fails_ready() {
        let dir = tempfile::tempdir().unwrap();
        let backend = HeadlessBackend::new(dir.path());
        let resource = backend
            .create("/audio/missing.mp3", PlaybackSettings::default())
            .unwrap();

        let err = resource.ready().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AudioLoadFailed);
        assert!(!resource.has_loaded_data());
        assert!(resource.play().is_err());
    }

    #[tokio::test]
    async fn release_drops_buffer_and_blocks_play() {
        let (_dir, backend) = backend_with("/a.mp3", b"0123456789");
        let resource = backend.create("/a.mp3", PlaybackSettings::default()).unwrap();
        resource.ready().await.unwrap();
        resource.play().unwrap();

        resource.release().unwrap();
        assert!(!resource.has_loaded_data());
        assert!(resource.is_paused());
        let err = resource.play().unwrap_err();
        assert_eq!(err.code, ErrorCode::AudioPlaybackFailed);
    }

    #[tokio::test]
    async fn concrete_resource_reports_buffer() {
        let (tx, rx) = watch::channel(LoadState::Loading);
        let resource = HeadlessResource {
            path: "/b.mp3".to_string(),
            settings: PlaybackSettings::default(),
            load: rx,
            playback: Mutex::new(Playback::default()),
        };
        assert_eq!(resource.buffered_bytes(), 0);
        resource.store(b"abc".to_vec());
        tx.send(LoadState::Ready).unwrap();
        resource.ready().await.unwrap();
        assert_eq!(resource.buffered_bytes(), 3);
        assert_eq!(resource.settings.volume, 0.3);
        assert!(resource.settings.looping);
        assert!(resource.settings.preload);
        assert_eq!(resource.position(), Duration::ZERO);

        resource.play().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        resource.pause();
        assert!(resource.position() > Duration::ZERO);
        resource.rewind();
        assert_eq!(resource.position(), Duration::ZERO);
    }

    #[test]
    fn create_outside_runtime_fails() {
        let backend = HeadlessBackend::new("/srv/public");
        let err = backend
            .create("/audio/a.mp3", PlaybackSettings::default())
            .err()
            .unwrap();
        assert_eq!(err.code, ErrorCode::AudioLoadFailed);
    }
}
