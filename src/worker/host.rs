//! Collaborators the controller talks to.
//!
//! The controller never opens sockets or windows itself. Network access goes
//! through [`Network`] and every host-visible effect (skip waiting, claiming
//! clients, notifications, opening windows) goes through [`WorkerHost`].

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::{Request, Response};

use super::notification::Notification;

/// Performs network requests on behalf of the controller.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetches a request. Non-success statuses are returned as responses;
    /// only transport failures are errors.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Host runtime effects requested by the controller.
#[async_trait]
pub trait WorkerHost: Send + Sync {
    /// Asks the host to activate this controller without waiting.
    async fn skip_waiting(&self) -> Result<()>;

    /// Takes control of all open clients.
    async fn claim_clients(&self) -> Result<()>;

    /// Shows a system notification.
    async fn show_notification(&self, notification: &Notification) -> Result<()>;

    /// Opens a client window at the given URL.
    async fn open_window(&self, url: &str) -> Result<()>;
}

/// An effect the controller asked the host to perform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum HostEffect {
    SkipWaiting,
    ClaimClients,
    ShowNotification { notification: Notification },
    OpenWindow { url: String },
}

/// Host that records every effect and always succeeds.
///
/// Used by the one-shot CLI modes, where there is no page to notify.
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    effects: Arc<Mutex<Vec<HostEffect>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every effect recorded so far.
    pub fn effects(&self) -> Vec<HostEffect> {
        self.effects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, effect: HostEffect) {
        self.effects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(effect);
    }
}

#[async_trait]
impl WorkerHost for RecordingHost {
    async fn skip_waiting(&self) -> Result<()> {
        self.record(HostEffect::SkipWaiting);
        Ok(())
    }

    async fn claim_clients(&self) -> Result<()> {
        self.record(HostEffect::ClaimClients);
        Ok(())
    }

    async fn show_notification(&self, notification: &Notification) -> Result<()> {
        self.record(HostEffect::ShowNotification {
            notification: notification.clone(),
        });
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<()> {
        self.record(HostEffect::OpenWindow {
            url: url.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_host_keeps_order() {
        let host = RecordingHost::new();
        host.skip_waiting().await.unwrap();
        host.open_window("/").await.unwrap();
        host.claim_clients().await.unwrap();

        assert_eq!(
            host.effects(),
            vec![
                HostEffect::SkipWaiting,
                HostEffect::OpenWindow {
                    url: "/".to_string()
                },
                HostEffect::ClaimClients,
            ]
        );
    }

    #[test]
    fn effect_serializes_with_tag() {
        let json = serde_json::to_value(HostEffect::OpenWindow {
            url: "/?action=dashboard".to_string(),
        })
        .unwrap();
        assert_eq!(json["effect"], "open_window");
        assert_eq!(json["url"], "/?action=dashboard");
    }
}
