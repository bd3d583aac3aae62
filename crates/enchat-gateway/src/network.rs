//! Live network access to the upstream origin.

use async_trait::async_trait;
use enchat_core::ports::Fetcher;
use enchat_core::{Error, GatewayConfig, GatewayRequest, GatewayResponse, Result};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Headers that describe a single hop and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Forwards requests to the upstream with `reqwest`.
///
/// Redirects are returned to the caller as-is.
pub struct UpstreamFetcher {
    client: reqwest::Client,
    upstream: Url,
    timeout: Option<Duration>,
}

impl UpstreamFetcher {
    pub fn new(upstream: Url, timeout: Option<Duration>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            upstream,
            timeout,
        })
    }

    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        Self::new(
            config.upstream.clone(),
            config.upstream_timeout_secs.map(Duration::from_secs),
        )
    }

    /// Upstream URL carrying the request's path and query.
    pub fn upstream_url(&self, request: &GatewayRequest) -> Url {
        let mut url = self.upstream.clone();
        url.set_path(request.url.path());
        url.set_query(request.url.query());
        url
    }
}

#[async_trait]
impl Fetcher for UpstreamFetcher {
    async fn fetch(&self, request: &GatewayRequest) -> Result<GatewayResponse> {
        let url = self.upstream_url(request);
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidRequest(format!("invalid method: {}", request.method)))?;
        debug!(method = %method, url = %url, "Fetching upstream");

        let mut builder = self.client.request(method, url.clone());
        for (name, value) in request.headers.iter() {
            if !HOP_BY_HOP.contains(&name) {
                builder = builder.header(name, value);
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| self.fetch_error(&url, e))?;

        let status = response.status().as_u16();
        let mut captured = GatewayResponse::new(status);
        for (name, value) in response.headers() {
            if HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            if let Ok(value) = value.to_str() {
                captured.headers.append(name.as_str(), value);
            }
        }
        let body = response.bytes().await.map_err(|e| self.fetch_error(&url, e))?;
        Ok(captured.with_body(body.to_vec()))
    }
}

impl UpstreamFetcher {
    fn fetch_error(&self, url: &Url, err: reqwest::Error) -> Error {
        match self.timeout {
            Some(timeout) if err.is_timeout() => Error::Timeout {
                url: url.to_string(),
                seconds: timeout.as_secs(),
            },
            _ => Error::Network(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::get;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn fetcher_for(server: &MockServer, timeout: Option<Duration>) -> UpstreamFetcher {
        UpstreamFetcher::new(Url::parse(&server.uri()).unwrap(), timeout).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_path_query_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "hello"))
            .and(header("accept", "text/html"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-origin", "yes")
                    .set_body_string("<html>results</html>"),
            )
            .mount(&server)
            .await;

        let fetcher = fetcher_for(&server, None).await;
        let request = get("/search?q=hello").with_header("accept", "text/html");
        let response = fetcher.fetch(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("x-origin"), Some("yes"));
        assert_eq!(response.body_text(), "<html>results</html>");
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let response = fetcher_for(&server, None)
            .await
            .fetch(&get("/missing"))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_ok());
    }

    #[tokio::test]
    async fn test_forwards_post_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat"))
            .and(body_string(r#"{"message":"hi"}"#))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let request = GatewayRequest::new("POST", get("/api/v1/chat").url)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"hi"}"#);
        let response = fetcher_for(&server, None)
            .await
            .fetch(&request)
            .await
            .unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_redirect_not_followed() {
        let server = MockServer::start().await;
        Mock::given(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
            .mount(&server)
            .await;

        let response = fetcher_for(&server, None)
            .await
            .fetch(&get("/old"))
            .await
            .unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(response.headers.get("location"), Some("/new"));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = fetcher_for(&server, Some(Duration::from_millis(100)))
            .await
            .fetch(&get("/slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_network_error() {
        let fetcher =
            UpstreamFetcher::new(Url::parse("http://127.0.0.1:1").unwrap(), None).unwrap();
        let err = fetcher.fetch(&get("/")).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }
}
