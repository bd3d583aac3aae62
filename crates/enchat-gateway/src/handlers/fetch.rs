//! The interception handler: every request outside the control routes.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use enchat_core::http::Headers;
use enchat_core::{ClientId, GatewayRequest, GatewayResponse};
use std::sync::Arc;
use tracing::warn;

use crate::router::FetchOutcome;
use crate::state::AppState;

pub const CLIENT_HEADER: &str = "x-enchat-client";
pub const SOURCE_HEADER: &str = "x-enchat-source";
pub const CLASS_HEADER: &str = "x-enchat-class";

const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub async fn intercept(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let gateway = &state.gateway;
    let (parts, body) = request.into_parts();

    let mut url = gateway.config().origin.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let headers: Headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let client = headers.get(CLIENT_HEADER).map(ClientId::new);

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
        }
    };

    let mut intercepted = GatewayRequest::new(parts.method.as_str(), url).with_body(body.to_vec());
    intercepted.headers = headers;

    let outcome = gateway.on_fetch(intercepted, client).await;
    into_http_response(outcome)
}

fn into_http_response(outcome: FetchOutcome) -> Response {
    let source = outcome.outcome.source();
    let route = outcome.route.label();
    let GatewayResponse {
        status,
        headers,
        body,
    } = outcome.into_response();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);

    let response_headers = response.headers_mut();
    for (name, value) in headers.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response_headers.append(name, value);
            }
            _ => warn!(header = name, "Dropping invalid response header"),
        }
    }
    response_headers.insert(SOURCE_HEADER, HeaderValue::from_static(source));
    response_headers.insert(CLASS_HEADER, HeaderValue::from_static(route));
    response
}
