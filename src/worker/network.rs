//! Network access over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;

use crate::error::{Result, WorkerError};
use crate::types::{Request, Response, ResponseType};

use super::host::Network;

/// [`Network`] backed by a `reqwest` client.
///
/// Responses whose final URL shares the configured origin are typed
/// [`ResponseType::Basic`]; everything else is [`ResponseType::Cors`], which
/// keeps cross-origin responses out of the dynamic cache.
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Url,
}

impl HttpNetwork {
    /// Creates a network client with a per-request timeout.
    pub fn new(origin: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                WorkerError::with_source(
                    crate::error::ErrorCode::NetworkFailed,
                    format!("Failed to create HTTP client: {}", e),
                    e,
                )
            })?;

        Ok(Self { client, origin })
    }

    fn response_type(&self, url: &Url) -> ResponseType {
        if url.origin() == self.origin.origin() {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let url = request.url.as_str();
        tracing::debug!(method = %request.method, url, "network fetch");

        let reply = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .map_err(|e| WorkerError::network(url, e.to_string()))?;

        let status = reply.status();
        let final_url = reply.url().clone();
        let headers: Vec<(String, String)> = reply
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = reply
            .bytes()
            .await
            .map_err(|e| WorkerError::network(url, format!("failed to read body: {}", e)))?;

        let mut response = Response::new(status.as_u16(), body.to_vec())
            .with_kind(self.response_type(&final_url))
            .with_url(final_url.as_str());
        response.headers = headers;
        Ok(response)
    }
}
