//! Health check handler.

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_version: Option<String>,
    pub waiting_version: Option<String>,
    pub last_install_error: Option<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let registration = state.gateway.lifecycle().snapshot().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_version: registration.active.map(|info| info.version),
        waiting_version: registration.waiting.map(|info| info.version),
        last_install_error: registration.last_install_error,
    })
}
