//! Intercepted request type.
//!
//! A Request is what the page asks the controller to fetch: method, absolute
//! URL, and the destination the host reports for it.

use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

/// What the page intends to do with a response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
    /// Top-level navigation.
    Document,
    Script,
    Style,
    Image,
    Audio,
    Font,
    Manifest,
    /// `fetch()` from script and anything the host leaves unlabeled.
    #[default]
    Empty,
    Other(String),
}

impl Destination {
    /// Returns the string representation of the destination.
    pub fn as_str(&self) -> &str {
        match self {
            Destination::Document => "document",
            Destination::Script => "script",
            Destination::Style => "style",
            Destination::Image => "image",
            Destination::Audio => "audio",
            Destination::Font => "font",
            Destination::Manifest => "manifest",
            Destination::Empty => "",
            Destination::Other(s) => s,
        }
    }

    /// Parses a destination from a string. Never fails.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "document" => Destination::Document,
            "script" => Destination::Script,
            "style" => Destination::Style,
            "image" => Destination::Image,
            "audio" => Destination::Audio,
            "font" => Destination::Font,
            "manifest" => Destination::Manifest,
            "" => Destination::Empty,
            other => Destination::Other(other.to_string()),
        }
    }

    /// Returns true for top-level document navigations.
    pub fn is_document(&self) -> bool {
        matches!(self, Destination::Document)
    }
}

impl Serialize for Destination {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Destination {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Destination::parse(&s))
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request intercepted by the controller.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
}

impl Request {
    /// Creates a request with an explicit method and destination.
    pub fn new(method: Method, url: Url, destination: Destination) -> Self {
        Self {
            method,
            url,
            destination,
        }
    }

    /// Creates a GET request with no destination.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, Destination::Empty)
    }

    /// Creates a GET navigation request.
    pub fn navigate(url: Url) -> Self {
        Self::new(Method::GET, url, Destination::Document)
    }

    /// Returns true if the method is GET.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// Returns true if the URL scheme is http or https.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Key under which responses to this request are cached.
    pub fn cache_key(&self) -> String {
        cache_key(&self.url)
    }
}

/// Returns the cache key for a URL: the absolute URL without its fragment.
pub fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}
