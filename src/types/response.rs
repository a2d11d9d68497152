//! Response type returned by the controller.
//!
//! Responses are fully buffered, so taking the copy that goes into the dynamic
//! cache is a plain clone made before the original is handed back.

use serde::{Deserialize, Serialize};

/// Message carried in the synthetic offline body.
pub const OFFLINE_MESSAGE: &str = "This content is not available offline";

/// How the response relates to the requesting origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response readable by the page.
    Cors,
    /// Cross-origin response the page cannot read.
    Opaque,
}

impl ResponseType {
    /// Returns the string representation of the response type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
        }
    }
}

/// A buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Vec<u8>,
    pub kind: ResponseType,
    /// Final URL after redirects, when known.
    pub url: Option<String>,
}

/// JSON body of the synthetic offline response.
#[derive(Debug, Serialize, Deserialize)]
struct OfflineBody<'a> {
    error: &'a str,
    message: &'a str,
    url: &'a str,
}

impl Response {
    /// Creates a basic response with the given status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            headers: Vec::new(),
            body: body.into(),
            kind: ResponseType::Basic,
            url: None,
        }
    }

    /// Builder: adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builder: sets the response type.
    pub fn with_kind(mut self, kind: ResponseType) -> Self {
        self.kind = kind;
        self
    }

    /// Builder: sets the final URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Builds the 503 JSON response served when a non-navigation fetch fails offline.
    pub fn offline(url: &str) -> Self {
        let body = OfflineBody {
            error: "Offline",
            message: OFFLINE_MESSAGE,
            url,
        };
        // Serializing three string fields cannot fail.
        let json = serde_json::to_vec(&body).unwrap_or_default();
        Self::new(503, json).with_header("Content-Type", "application/json")
    }

    /// Returns true for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true if this response may be stored in the dynamic cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.kind == ResponseType::Basic
    }

    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the body as UTF-8 text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Parses the body as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Canonical reason phrase for the statuses the controller produces.
fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_response_shape() {
        let resp = Response::offline("http://localhost:5173/api/personas");
        assert_eq!(resp.status, 503);
        assert_eq!(resp.status_text, "Service Unavailable");
        assert_eq!(resp.header("content-type"), Some("application/json"));

        let body = resp.json().unwrap();
        assert_eq!(body["error"], "Offline");
        assert_eq!(body["message"], OFFLINE_MESSAGE);
        assert_eq!(body["url"], "http://localhost:5173/api/personas");
    }

    #[test]
    fn offline_body_field_order() {
        let resp = Response::offline("u");
        assert_eq!(
            resp.text().unwrap(),
            r#"{"error":"Offline","message":"This content is not available offline","url":"u"}"#
        );
    }

    #[test]
    fn cacheable_requires_200_basic() {
        assert!(Response::new(200, "x").is_cacheable());
        assert!(!Response::new(204, "").is_cacheable());
        assert!(!Response::new(404, "").is_cacheable());
        assert!(!Response::new(200, "x")
            .with_kind(ResponseType::Opaque)
            .is_cacheable());
        assert!(!Response::new(200, "x")
            .with_kind(ResponseType::Cors)
            .is_cacheable());
    }

    #[test]
    fn ok_range() {
        assert!(Response::new(200, "").ok());
        assert!(Response::new(299, "").ok());
        assert!(!Response::new(304, "").ok());
        assert!(!Response::new(503, "").ok());
    }
}
