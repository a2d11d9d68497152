//! JSON-RPC method handlers.
//!
//! Implements the handlers for all supported JSON-RPC methods. Each handler
//! parses its params, calls into the controller or the player, and converts
//! the outcome to a JSON value.

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{Destination, Request};
use crate::worker::{FetchOutcome, PendingAction, WorkerMessage};

use super::server::ServerState;
use super::types::{
    FetchParams, FetchResult, JsonRpcError, NotificationClickParams, PlayParams, PushParams,
    QueueActionParams, QueueActionResult, StatusResult, SyncParams,
};

type MethodResult = Result<serde_json::Value, JsonRpcError>;

/// Handles a JSON-RPC method call.
pub async fn handle_request(
    method: &str,
    params: serde_json::Value,
    state: &ServerState,
) -> MethodResult {
    match method {
        "ping" => handle_ping(),
        "status" => handle_status(state).await,
        "install" => to_value(state.controller.install().await?),
        "activate" => to_value(state.controller.activate().await?),
        "fetch" => handle_fetch(params, state).await,
        "message" => handle_message(params, state).await,
        "push" => handle_push(params, state).await,
        "notification_click" => handle_notification_click(params, state).await,
        "sync" => handle_sync(params, state).await,
        "queue_action" => handle_queue_action(params, state).await,
        "clear_caches" => handle_clear_caches(state).await,
        "play" => handle_play(params, state),
        "stop" => handle_stop(state),
        "audio_status" => to_value(state.player.status()),
        "shutdown" => handle_shutdown(state),
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

/// Like [`parse_params`], but treats absent params as an empty object.
fn parse_optional<T: DeserializeOwned + Default>(
    params: serde_json::Value,
) -> Result<T, JsonRpcError> {
    if params.is_null() {
        Ok(T::default())
    } else {
        parse_params(params)
    }
}

fn to_value<T: Serialize>(value: T) -> MethodResult {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::internal_error(format!("Failed to encode result: {}", e)))
}

/// Handles the ping method for health checks.
fn handle_ping() -> MethodResult {
    Ok(serde_json::json!({ "status": "ok" }))
}

/// Handles the shutdown method.
fn handle_shutdown(state: &ServerState) -> MethodResult {
    state.shutdown();
    Ok(serde_json::json!({ "status": "shutting_down" }))
}

async fn handle_status(state: &ServerState) -> MethodResult {
    to_value(StatusResult {
        version: env!("CARGO_PKG_VERSION"),
        worker: state.controller.status().await?,
        audio: state.player.status(),
    })
}

/// Handles the fetch method: runs one request through the controller.
async fn handle_fetch(params: serde_json::Value, state: &ServerState) -> MethodResult {
    let params: FetchParams = parse_params(params)?;

    let url = match Url::parse(&params.url) {
        Ok(url) => url,
        Err(_) => state
            .controller
            .origin()
            .join(&params.url)
            .map_err(|e| JsonRpcError::invalid_params(format!("Invalid url {}: {}", params.url, e)))?,
    };
    let method = Method::from_bytes(params.method.to_uppercase().as_bytes())
        .map_err(|_| JsonRpcError::invalid_params(format!("Invalid method: {}", params.method)))?;

    let request = Request::new(method, url, Destination::parse(&params.destination));

    let result = match state.controller.handle_fetch(&request).await {
        FetchOutcome::Passthrough => FetchResult::default(),
        FetchOutcome::Respond { response, source } => FetchResult {
            handled: true,
            source: Some(source),
            status: Some(response.status),
            status_text: Some(response.status_text.clone()),
            body: response.text().map(str::to_string),
            body_len: Some(response.body.len()),
            headers: Some(response.headers),
        },
    };
    to_value(result)
}

async fn handle_message(params: serde_json::Value, state: &ServerState) -> MethodResult {
    let message = WorkerMessage::from_value(params)?;
    to_value(state.controller.handle_message(message).await?)
}

async fn handle_push(params: serde_json::Value, state: &ServerState) -> MethodResult {
    let params: PushParams = parse_optional(params)?;
    to_value(state.controller.handle_push(params.data.as_deref()).await?)
}

async fn handle_notification_click(params: serde_json::Value, state: &ServerState) -> MethodResult {
    let params: NotificationClickParams = parse_optional(params)?;
    to_value(
        state
            .controller
            .handle_notification_click(params.action.as_deref())
            .await?,
    )
}

async fn handle_sync(params: serde_json::Value, state: &ServerState) -> MethodResult {
    let params: SyncParams = parse_params(params)?;
    to_value(state.controller.handle_sync(&params.tag).await)
}

async fn handle_queue_action(params: serde_json::Value, state: &ServerState) -> MethodResult {
    let params: QueueActionParams = parse_params(params)?;

    let mut action = PendingAction::new(params.url, params.method);
    if let Some(id) = params.id {
        action.id = id;
    }
    if let Some(body) = params.body {
        action = action.with_body(body);
    }

    let id = action.id.clone();
    let pending = state.controller.queue_action(action).await?;
    to_value(QueueActionResult { id, pending })
}

async fn handle_clear_caches(state: &ServerState) -> MethodResult {
    let deleted = state.controller.clear_caches().await?;
    Ok(serde_json::json!({ "deleted": deleted }))
}

fn handle_play(params: serde_json::Value, state: &ServerState) -> MethodResult {
    let params: PlayParams = parse_params(params)?;
    to_value(state.player.play(&params.method, &params.age_group))
}

fn handle_stop(state: &ServerState) -> MethodResult {
    state.player.stop();
    to_value(state.player.status())
}
