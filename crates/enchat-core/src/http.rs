//! Transport-neutral request and response snapshots.
//!
//! The gateway never holds a live body stream: a response is captured as a
//! status, an ordered header list and a byte body, so duplicating it before
//! storage is an ordinary `clone()`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Ordered header list with lower-cased names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replace every value of `name` with a single value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        self.0.retain(|(key, _)| *key != name);
        self.0.push((name, value.into()));
    }

    /// Add a value without touching existing ones (e.g. `set-cookie`).
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into().to_ascii_lowercase(), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.0.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRequest {
    pub method: String,
    pub url: Url,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl GatewayRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Build a `GET` for `path` resolved against `origin`.
    pub fn get_path(origin: &Url, path: &str) -> Result<Self> {
        Ok(Self::get(origin.join(path)?))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Whether the `accept` header lists the given media type.
    pub fn accepts(&self, media_type: &str) -> bool {
        self.headers
            .get("accept")
            .is_some_and(|accept| accept.contains(media_type))
    }

    /// Cache identity: method plus URL, fragment excluded.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        format!("{} {}", self.method, url)
    }

    /// Reject anything the cache cannot hold.
    pub fn ensure_cacheable(&self) -> Result<()> {
        if self.is_get() {
            Ok(())
        } else {
            Err(Error::InvalidRequest(format!(
                "only GET requests can be cached, got {}",
                self.method
            )))
        }
    }
}

/// A captured or synthesized response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl GatewayResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Plain-text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(body.into().into_bytes())
    }

    /// JSON response.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header("content-type", "application/json")
            .with_body(value.to_string().into_bytes())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/html");
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));

        headers.insert("content-type", "text/css");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Content-Type"), Some("text/css"));
    }

    #[test]
    fn test_headers_append_keeps_duplicates() {
        let headers: Headers = [("Set-Cookie", "a=1"), ("set-cookie", "b=2")]
            .into_iter()
            .collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("set-cookie"), Some("a=1"));
    }

    #[test]
    fn test_cache_key_drops_fragment() {
        let a = GatewayRequest::get(url("http://localhost/index.html#top"));
        let b = GatewayRequest::get(url("http://localhost/index.html"));
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "GET http://localhost/index.html");
    }

    #[test]
    fn test_cache_key_keeps_query() {
        let a = GatewayRequest::get(url("http://localhost/app.js?v=1"));
        let b = GatewayRequest::get(url("http://localhost/app.js?v=2"));
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_accepts_html() {
        let req = GatewayRequest::get(url("http://localhost/chat"))
            .with_header("Accept", "text/html,application/xhtml+xml");
        assert!(req.accepts("text/html"));
        assert!(!GatewayRequest::get(url("http://localhost/chat")).accepts("text/html"));
    }

    #[test]
    fn test_ensure_cacheable() {
        let get = GatewayRequest::get(url("http://localhost/"));
        assert!(get.ensure_cacheable().is_ok());

        let post = GatewayRequest::new("POST", url("http://localhost/"));
        assert!(matches!(post.ensure_cacheable(), Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_response_is_ok() {
        assert!(GatewayResponse::new(200).is_ok());
        assert!(GatewayResponse::new(204).is_ok());
        assert!(!GatewayResponse::new(304).is_ok());
        assert!(!GatewayResponse::new(500).is_ok());
    }
}
