//! Host effects delivered as JSON-RPC notifications.

use async_trait::async_trait;

use crate::error::Result;
use crate::worker::{Notification, WorkerHost};

use super::server::send_notification;
use super::types::OpenWindowParams;

/// [`WorkerHost`] that writes each effect to stdout as a notification for
/// the client process to act on.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyingHost;

#[async_trait]
impl WorkerHost for NotifyingHost {
    async fn skip_waiting(&self) -> Result<()> {
        send_notification("skip_waiting", serde_json::json!({}));
        Ok(())
    }

    async fn claim_clients(&self) -> Result<()> {
        send_notification("clients_claimed", serde_json::json!({}));
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        send_notification("show_notification", notification);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<()> {
        send_notification(
            "open_window",
            OpenWindowParams {
                url: url.to_string(),
            },
        );
        Ok(())
    }
}
