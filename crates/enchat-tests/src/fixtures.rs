//! Upstream site fixtures and gateway configurations.

use enchat_core::GatewayConfig;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A small site: the pages and assets a version precaches.
pub struct SiteFixture;

impl SiteFixture {
    pub const INDEX: &'static str = "<html><body>EnChat</body></html>";
    pub const STYLE: &'static str = "body { margin: 0 }";
    pub const SCRIPT: &'static str = "console.log('enchat')";

    pub fn precache() -> Vec<String> {
        ["/", "/index.html", "/static/style.css", "/static/app.js"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Mount every precached path on the upstream.
    pub async fn mount(server: &MockServer) {
        for (route, body, content_type) in [
            ("/", Self::INDEX, "text/html"),
            ("/index.html", Self::INDEX, "text/html"),
            ("/static/style.css", Self::STYLE, "text/css"),
            ("/static/app.js", Self::SCRIPT, "application/javascript"),
        ] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", content_type)
                        .set_body_string(body),
                )
                .mount(server)
                .await;
        }
    }

    /// Mount an extra page or resource.
    pub async fn mount_page(server: &MockServer, route: &str, body: &str, content_type: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", content_type)
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    /// Make `route` fail with a server error, overriding earlier mocks.
    pub async fn break_route(server: &MockServer, route: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(server)
            .await;
    }
}

/// Gateway configuration pointed at a mock upstream.
pub fn gateway_config(upstream: &MockServer, version: &str) -> GatewayConfig {
    GatewayConfig {
        version: version.to_string(),
        upstream: Url::parse(&upstream.uri()).unwrap_or_else(|_| GatewayConfig::default().upstream),
        listen_addr: "127.0.0.1:0".to_string(),
        precache: SiteFixture::precache(),
        upstream_timeout_secs: Some(2),
        ..GatewayConfig::default()
    }
}
