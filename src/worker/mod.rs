//! Offline cache controller.
//!
//! The controller intercepts page fetches and answers them cache-first,
//! falling back to the network and then to an offline response. It also
//! handles the lifecycle events (install, activate), page messages, push
//! notifications, notification clicks and background sync.

pub mod controller;
pub mod host;
pub mod lifecycle;
pub mod message;
pub mod network;
pub mod notification;
pub mod sync;

// Re-export commonly used types
pub use controller::{
    ActivateOutcome, ClickOutcome, ControllerStatus, FetchOutcome, InstallOutcome,
    MessageOutcome, OfflineController, ResponseSource,
};
pub use host::{HostEffect, Network, RecordingHost, WorkerHost};
pub use lifecycle::WorkerState;
pub use message::WorkerMessage;
pub use network::HttpNetwork;
pub use notification::{ClickAction, Notification};
pub use sync::{
    action_store_from_config, ActionProcessor, DiskActionStore, HttpActionProcessor,
    MemoryActionStore, PendingAction, PendingActionStore, SyncBackend, SyncOutcome,
};
