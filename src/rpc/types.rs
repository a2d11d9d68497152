//! JSON-RPC types for the daemon protocol.
//!
//! Envelopes, error objects, method parameters and the results that are not
//! plain library types.

use serde::{Deserialize, Serialize};

use crate::audio::AudioStatus;
use crate::error::{ErrorCode, WorkerError};
use crate::worker::{ControllerStatus, ResponseSource};

/// JSON-RPC version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// A JSON-RPC request ID.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequestId {
    Integer(i64),
    String(String),
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Integer(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

/// A JSON-RPC request wrapper.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub id: RequestId,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A JSON-RPC response wrapper.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub id: RequestId,
    pub result: T,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(id: RequestId, result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl JsonRpcErrorResponse {
    pub fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            error,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonRpcErrorData>,
}

/// Extended error data for application-specific errors.
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorData {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<String>,
}

/// JSON-RPC code for an application error.
pub fn application_code(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::CacheStorageFailed => -32000,
        ErrorCode::NetworkFailed => -32001,
        ErrorCode::AssetUnavailable => -32002,
        ErrorCode::InstallFailed => -32003,
        ErrorCode::InvalidState => -32004,
        ErrorCode::InvalidMessage => -32005,
        ErrorCode::SyncActionFailed => -32006,
        ErrorCode::HostFailed => -32007,
        ErrorCode::AudioLoadFailed => -32008,
        ErrorCode::AudioPlaybackFailed => -32009,
        ErrorCode::InvalidConfig => -32010,
    }
}

impl JsonRpcError {
    /// Creates a parse error (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self {
            code: -32700,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an invalid request error (-32600).
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    /// Creates a method not found error (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    /// Creates an invalid params error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }

    /// Creates an internal error (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }
}

impl From<WorkerError> for JsonRpcError {
    fn from(e: WorkerError) -> Self {
        Self {
            code: application_code(e.code),
            message: e.code.description().to_string(),
            data: Some(JsonRpcErrorData {
                error_code: e.code.as_str().to_string(),
                details: Some(e.message),
                recovery: Some(e.code.recovery_hint().to_string()),
            }),
        }
    }
}

// ============================================================================
// Method parameters
// ============================================================================

fn default_get() -> String {
    "GET".to_string()
}

fn default_post() -> String {
    "POST".to_string()
}

/// Parameters for `fetch`.
#[derive(Debug, Deserialize)]
pub struct FetchParams {
    /// Absolute URL, or a path relative to the origin.
    pub url: String,
    #[serde(default = "default_get")]
    pub method: String,
    #[serde(default)]
    pub destination: String,
}

/// Parameters for `push`.
#[derive(Debug, Default, Deserialize)]
pub struct PushParams {
    #[serde(default)]
    pub data: Option<String>,
}

/// Parameters for `notification_click`.
#[derive(Debug, Default, Deserialize)]
pub struct NotificationClickParams {
    #[serde(default)]
    pub action: Option<String>,
}

/// Parameters for `sync`.
#[derive(Debug, Deserialize)]
pub struct SyncParams {
    pub tag: String,
}

/// Parameters for `queue_action`.
#[derive(Debug, Deserialize)]
pub struct QueueActionParams {
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
    #[serde(default = "default_post")]
    pub method: String,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

/// Parameters for `play`.
#[derive(Debug, Deserialize)]
pub struct PlayParams {
    pub method: String,
    pub age_group: String,
}

// ============================================================================
// Method results
// ============================================================================

/// Result of `fetch`.
#[derive(Debug, Default, Serialize)]
pub struct FetchResult {
    /// False when the controller let the request pass through.
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ResponseSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<(String, String)>>,
    /// Body text, when the body is valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_len: Option<usize>,
}

/// Result of `queue_action`.
#[derive(Debug, Serialize)]
pub struct QueueActionResult {
    pub id: String,
    /// Actions waiting for the next background sync.
    pub pending: usize,
}

/// Result of `status`.
#[derive(Debug, Serialize)]
pub struct StatusResult {
    pub version: &'static str,
    pub worker: ControllerStatus,
    pub audio: AudioStatus,
}

// ============================================================================
// Notifications
// ============================================================================

/// A JSON-RPC notification (no id field).
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<T: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub params: T,
}

impl<T: Serialize> JsonRpcNotification<T> {
    pub fn new(method: &'static str, params: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Params of the `open_window` notification.
#[derive(Debug, Serialize)]
pub struct OpenWindowParams {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_from_int() {
        let id: RequestId = 42.into();
        assert_eq!(id, RequestId::Integer(42));
    }

    #[test]
    fn request_id_from_string() {
        let id: RequestId = "abc".to_string().into();
        assert_eq!(id, RequestId::String("abc".to_string()));
    }

    #[test]
    fn json_rpc_error_codes() {
        assert_eq!(JsonRpcError::parse_error("").code, -32700);
        assert_eq!(JsonRpcError::invalid_request("").code, -32600);
        assert_eq!(JsonRpcError::method_not_found("").code, -32601);
        assert_eq!(JsonRpcError::invalid_params("").code, -32602);
        assert_eq!(JsonRpcError::internal_error("").code, -32603);
    }

    #[test]
    fn worker_error_maps_to_application_error() {
        let err: JsonRpcError = WorkerError::invalid_state("activate", "uninstalled").into();
        assert_eq!(err.code, -32004);
        let data = err.data.unwrap();
        assert_eq!(data.error_code, "INVALID_STATE");
        assert!(data.details.unwrap().contains("uninstalled"));
        assert!(data.recovery.is_some());
    }

    #[test]
    fn application_codes_are_distinct() {
        let codes = [
            ErrorCode::CacheStorageFailed,
            ErrorCode::NetworkFailed,
            ErrorCode::AssetUnavailable,
            ErrorCode::InstallFailed,
            ErrorCode::InvalidState,
            ErrorCode::InvalidMessage,
            ErrorCode::SyncActionFailed,
            ErrorCode::HostFailed,
            ErrorCode::AudioLoadFailed,
            ErrorCode::AudioPlaybackFailed,
            ErrorCode::InvalidConfig,
        ];
        let mut seen: Vec<i32> = codes.iter().map(|c| application_code(*c)).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), codes.len());
        assert!(seen.iter().all(|c| (-32099..=-32000).contains(c)));
    }

    #[test]
    fn fetch_params_defaults() {
        let params: FetchParams = serde_json::from_str(r#"{"url":"/index.html"}"#).unwrap();
        assert_eq!(params.method, "GET");
        assert_eq!(params.destination, "");
    }

    #[test]
    fn queue_action_defaults_to_post() {
        let params: QueueActionParams =
            serde_json::from_str(r#"{"url":"/api/quiz","body":{"answer":3}}"#).unwrap();
        assert_eq!(params.method, "POST");
        assert!(params.id.is_none());
        assert_eq!(params.body.unwrap()["answer"], 3);
    }
}
