//! Media backend seam.
//!
//! A [`MediaBackend`] creates one [`MediaResource`] per asset. The resource
//! starts loading as soon as it is created and signals readiness through
//! [`MediaResource::ready`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Playback volume for hover previews.
pub const PREVIEW_VOLUME: f32 = 0.3;

/// Settings applied to every new resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub volume: f32,
    pub looping: bool,
    /// Fetch the whole asset up front instead of on play.
    pub preload: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: PREVIEW_VOLUME,
            looping: true,
            preload: true,
        }
    }
}

/// A loaded or loading audio asset.
#[async_trait]
pub trait MediaResource: Send + Sync {
    /// Asset path the resource was created for.
    fn path(&self) -> &str;

    /// Resolves once the resource can play, or with the load error.
    async fn ready(&self) -> Result<()>;

    /// Starts playback.
    fn play(&self) -> Result<()>;

    /// Pauses playback. Does nothing if already paused.
    fn pause(&self);

    /// Moves the playback position back to the start.
    fn rewind(&self);

    /// True if playback is not running.
    fn is_paused(&self) -> bool;

    /// True once any media data has been loaded.
    fn has_loaded_data(&self) -> bool;

    /// Detaches the source and drops buffered media.
    fn release(&self) -> Result<()>;
}

/// Creates media resources.
pub trait MediaBackend: Send + Sync {
    /// Creates a resource for `path` with the given settings and begins
    /// loading it.
    fn create(&self, path: &str, settings: PlaybackSettings) -> Result<Arc<dyn MediaResource>>;
}

/// True if both handles point at the same resource.
pub fn same_resource(a: &Arc<dyn MediaResource>, b: &Arc<dyn MediaResource>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}
