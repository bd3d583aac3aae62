//! Request classification.

use enchat_core::{GatewayConfig, GatewayRequest};
use serde::Serialize;
use std::fmt;

/// Class of an intercepted request. Selects the caching strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestClass {
    /// Backend call under the API prefix.
    Api,
    /// Asset with an allow-listed extension.
    Static,
    /// HTML document navigation.
    Navigational,
    Default,
}

impl RequestClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::Api => "api",
            RequestClass::Static => "static",
            RequestClass::Navigational => "navigational",
            RequestClass::Default => "default",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request is left to the network untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BypassReason {
    /// Not a retrieval method.
    Method,
    /// Not an http(s) URL.
    Scheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Bypass(BypassReason),
    Handle(RequestClass),
}

/// Stateless classifier built from the gateway configuration.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    api_prefix: String,
    static_extensions: Vec<String>,
}

impl RequestClassifier {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            api_prefix: config.api_prefix.clone(),
            static_extensions: config.static_extensions.clone(),
        }
    }

    /// Rules apply in order; the first match wins.
    pub fn classify(&self, request: &GatewayRequest) -> Classification {
        if !request.is_get() {
            return Classification::Bypass(BypassReason::Method);
        }
        if !matches!(request.url.scheme(), "http" | "https") {
            return Classification::Bypass(BypassReason::Scheme);
        }

        let path = request.path();
        let class = if path.starts_with(&self.api_prefix) {
            RequestClass::Api
        } else if self.is_static_path(path) {
            RequestClass::Static
        } else if request.accepts("text/html") {
            RequestClass::Navigational
        } else {
            RequestClass::Default
        };
        Classification::Handle(class)
    }

    fn is_static_path(&self, path: &str) -> bool {
        self.static_extensions.iter().any(|ext| path.ends_with(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn classifier() -> RequestClassifier {
        RequestClassifier::new(&GatewayConfig::default())
    }

    fn get(url: &str) -> GatewayRequest {
        GatewayRequest::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_non_get_bypasses() {
        let request = GatewayRequest::new("POST", Url::parse("http://localhost/api/v1/chat").unwrap());
        assert_eq!(
            classifier().classify(&request),
            Classification::Bypass(BypassReason::Method)
        );
        let head = GatewayRequest::new("HEAD", Url::parse("http://localhost/").unwrap());
        assert_eq!(
            classifier().classify(&head),
            Classification::Bypass(BypassReason::Method)
        );
    }

    #[test]
    fn test_non_http_scheme_bypasses() {
        let request = get("chrome-extension://abcdef/content.js");
        assert_eq!(
            classifier().classify(&request),
            Classification::Bypass(BypassReason::Scheme)
        );
    }

    #[test]
    fn test_api_prefix() {
        assert_eq!(
            classifier().classify(&get("http://localhost/api/v1/chat")),
            Classification::Handle(RequestClass::Api)
        );
    }

    #[test]
    fn test_api_wins_over_static_extension() {
        assert_eq!(
            classifier().classify(&get("http://localhost/api/bundle.js")),
            Classification::Handle(RequestClass::Api)
        );
    }

    #[test]
    fn test_static_extensions() {
        for path in ["/static/style.css", "/src/app.js", "/static/favicon.ico", "/fonts/a.woff2"] {
            assert_eq!(
                classifier().classify(&get(&format!("http://localhost{path}"))),
                Classification::Handle(RequestClass::Static),
                "{path}"
            );
        }
    }

    #[test]
    fn test_static_match_is_case_sensitive() {
        let request = get("http://localhost/LOGO.PNG");
        assert_eq!(
            classifier().classify(&request),
            Classification::Handle(RequestClass::Default)
        );
    }

    #[test]
    fn test_static_wins_over_html_accept() {
        let request = get("https://localhost/static/style.css").with_header("accept", "text/html");
        assert_eq!(
            classifier().classify(&request),
            Classification::Handle(RequestClass::Static)
        );
    }

    #[test]
    fn test_navigational() {
        let request = get("http://localhost/chat").with_header("accept", "text/html,*/*;q=0.8");
        assert_eq!(
            classifier().classify(&request),
            Classification::Handle(RequestClass::Navigational)
        );
    }

    #[test]
    fn test_default() {
        let request = get("http://localhost/manifest.json").with_header("accept", "application/json");
        assert_eq!(
            classifier().classify(&request),
            Classification::Handle(RequestClass::Default)
        );
    }

    #[test]
    fn test_custom_api_prefix() {
        let config = GatewayConfig {
            api_prefix: "/backend/".into(),
            ..GatewayConfig::default()
        };
        let classifier = RequestClassifier::new(&config);
        assert_eq!(
            classifier.classify(&get("http://localhost/backend/ask")),
            Classification::Handle(RequestClass::Api)
        );
        assert_eq!(
            classifier.classify(&get("http://localhost/api/ask")),
            Classification::Handle(RequestClass::Default)
        );
    }
}
