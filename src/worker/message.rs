//! Messages posted by the page to the controller.

use serde::Deserialize;

use crate::error::{Result, WorkerError};

/// A page message, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    /// Activate now instead of waiting.
    SkipWaiting,
    /// Fetch these URLs and store them in the dynamic cache.
    CacheUrls { urls: Vec<String> },
}

impl WorkerMessage {
    /// Parses a message from its JSON form.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| WorkerError::invalid_message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    #[test]
    fn parses_skip_waiting() {
        let msg = WorkerMessage::from_value(json!({"type": "SKIP_WAITING"})).unwrap();
        assert_eq!(msg, WorkerMessage::SkipWaiting);
    }

    #[test]
    fn parses_cache_urls() {
        let msg = WorkerMessage::from_value(json!({
            "type": "CACHE_URLS",
            "urls": ["/audio/dashboard-playlist/radio1.mp3"]
        }))
        .unwrap();
        assert_eq!(
            msg,
            WorkerMessage::CacheUrls {
                urls: vec!["/audio/dashboard-playlist/radio1.mp3".to_string()]
            }
        );
    }

    #[test]
    fn rejects_unknown_or_incomplete() {
        for value in [
            json!({"type": "REFRESH"}),
            json!({"type": "CACHE_URLS"}),
            json!({"urls": []}),
            json!("SKIP_WAITING"),
        ] {
            let err = WorkerMessage::from_value(value).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidMessage);
        }
    }
}
