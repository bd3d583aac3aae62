//! Route definitions.

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{control, fetch, health, notifications, partitions, sync};
use crate::middleware::{cors_layer, request_id};
use crate::state::AppState;

/// Prefix reserved for the gateway's own routes.
pub const CONTROL_PREFIX: &str = "/__enchat";

/// Create the gateway router. Anything outside the control prefix is
/// intercepted.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(CONTROL_PREFIX, control_routes())
        .fallback(fetch::intercept)
        .layer(axum_middleware::from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn control_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/message", post(control::post_message))
        .route("/install", post(control::install))
        .route("/push", post(notifications::push))
        .route("/notification-click", post(notifications::notification_click))
        .route("/sync/{tag}", post(sync::trigger_sync))
        .route("/queue", get(sync::list_queue).post(sync::enqueue))
        .route("/partitions", get(partitions::list_partitions))
        .route("/partitions/{name}", delete(partitions::delete_partition))
        .layer(cors_layer())
}
