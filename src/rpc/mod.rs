//! JSON-RPC module for daemon communication.
//!
//! Provides the JSON-RPC 2.0 server implementation. Each controller event and
//! player operation is a method:
//! - `install`, `activate`, `fetch`, `message`, `push`, `notification_click`,
//!   `sync`: offline controller events
//! - `queue_action`, `clear_caches`, `status`: controller maintenance
//! - `play`, `stop`, `audio_status`: hover previews
//! - `ping`, `shutdown`: daemon control
//!
//! Notifications:
//! - `skip_waiting`: the controller asks to be activated
//! - `clients_claimed`: the controller took control of open pages
//! - `show_notification`: display a system notification
//! - `open_window`: open a page at the given URL

pub mod host;
pub mod methods;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use host::NotifyingHost;
pub use server::{run_server, send_notification, ServerState};
pub use types::{
    JsonRpcError, JsonRpcErrorResponse, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
