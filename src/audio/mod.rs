//! Hover-driven audio previews.
//!
//! Resolves a discovery method and age group to a playlist file and keeps at
//! most one looping preview alive.

pub mod catalog;
pub mod headless;
pub mod media;
pub mod player;

// Re-export commonly used items
pub use catalog::{resolve, AgeGroup, DiscoveryMethod, Relationship, Track, AUDIO_BASE_PATH};
pub use headless::HeadlessBackend;
pub use media::{MediaBackend, MediaResource, PlaybackSettings};
pub use player::{AudioPlayer, AudioStatus, PlayOutcome};
