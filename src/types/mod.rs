//! Core types for the music-dna daemon.
//!
//! - [`Request`]: a fetch intercepted by the offline controller
//! - [`Response`]: a buffered response, cached or live

mod request;
mod response;

// Re-export all types at the module level
pub use request::{cache_key, Destination, Request};
pub use response::{Response, ResponseType, OFFLINE_MESSAGE};
