//! Push notifications and notification clicks.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// Title shown on every push notification.
pub const NOTIFICATION_TITLE: &str = "Canadian Music DNA";

/// Body used when a push arrives without a payload.
pub const DEFAULT_PUSH_BODY: &str = "New music insights available!";

const ICON: &str = "/icons/icon-192x192.png";
const BADGE: &str = "/icons/icon-72x72.png";
const VIBRATE_PATTERN: [u32; 3] = [100, 50, 100];

/// Window opened by the "explore" action.
pub const EXPLORE_URL: &str = "/?action=dashboard";

/// Window opened by a click on the notification body.
pub const ROOT_URL: &str = "/";

/// A button shown on the notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// Data attached to the notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Milliseconds since the Unix epoch.
    pub date_of_arrival: u64,
    pub primary_key: u32,
}

/// A notification the host should display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// Builds the notification for a push, using the payload text as body.
    pub fn for_push(payload: Option<&str>) -> Self {
        Self::for_push_at(payload, now_millis())
    }

    fn for_push_at(payload: Option<&str>, date_of_arrival: u64) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            body: payload.unwrap_or(DEFAULT_PUSH_BODY).to_string(),
            icon: ICON.to_string(),
            badge: BADGE.to_string(),
            vibrate: VIBRATE_PATTERN.to_vec(),
            data: NotificationData {
                date_of_arrival,
                primary_key: 1,
            },
            actions: vec![
                NotificationAction {
                    action: "explore".to_string(),
                    title: "Explore Now".to_string(),
                    icon: "/icons/explore.png".to_string(),
                },
                NotificationAction {
                    action: "close".to_string(),
                    title: "Close".to_string(),
                    icon: "/icons/close.png".to_string(),
                },
            ],
        }
    }
}

/// What the user clicked on a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClickAction {
    /// The "Explore Now" button.
    Explore,
    /// The "Close" button.
    Close,
    /// The notification body, or an action this build does not know.
    Default,
}

impl ClickAction {
    /// Maps the host's action identifier to a click action.
    pub fn from_action(action: Option<&str>) -> Self {
        match action {
            Some("explore") => ClickAction::Explore,
            Some("close") => ClickAction::Close,
            _ => ClickAction::Default,
        }
    }

    /// URL to open for this click, if any.
    pub fn target(&self) -> Option<&'static str> {
        match self {
            ClickAction::Explore => Some(EXPLORE_URL),
            ClickAction::Close => None,
            ClickAction::Default => Some(ROOT_URL),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_without_payload_uses_default_body() {
        let n = Notification::for_push_at(None, 42);
        assert_eq!(n.title, "Canadian Music DNA");
        assert_eq!(n.body, DEFAULT_PUSH_BODY);
        assert_eq!(n.vibrate, vec![100, 50, 100]);
        assert_eq!(n.data.date_of_arrival, 42);
        assert_eq!(n.data.primary_key, 1);
    }

    #[test]
    fn push_payload_becomes_body() {
        let n = Notification::for_push(Some("Your DNA report is ready"));
        assert_eq!(n.body, "Your DNA report is ready");
        assert!(n.data.date_of_arrival > 0);
    }

    #[test]
    fn notification_has_explore_and_close() {
        let n = Notification::for_push(None);
        let ids: Vec<&str> = n.actions.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(ids, vec!["explore", "close"]);
    }

    #[test]
    fn data_serializes_camel_case() {
        let json = serde_json::to_value(Notification::for_push_at(None, 7)).unwrap();
        assert_eq!(json["data"]["dateOfArrival"], 7);
        assert_eq!(json["data"]["primaryKey"], 1);
        assert_eq!(json["badge"], "/icons/icon-72x72.png");
    }

    #[test]
    fn click_targets() {
        assert_eq!(
            ClickAction::from_action(Some("explore")).target(),
            Some("/?action=dashboard")
        );
        assert_eq!(ClickAction::from_action(Some("close")).target(), None);
        assert_eq!(ClickAction::from_action(None).target(), Some("/"));
        assert_eq!(
            ClickAction::from_action(Some("snooze")),
            ClickAction::Default
        );
    }
}
