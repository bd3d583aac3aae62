//! Push and notification click handlers.

use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use enchat_core::ports::WindowAction;
use enchat_notify::{NotificationAction, PushNotification};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error_response;
use crate::state::AppState;

/// The raw body is the push payload; an empty body means none.
pub async fn push(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PushNotification>, (StatusCode, String)> {
    let payload = (!body.is_empty()).then_some(body.as_ref());
    state
        .gateway
        .on_push(payload)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
pub struct ClickRequest {
    #[serde(default)]
    pub action: Option<NotificationAction>,
}

#[derive(Serialize)]
pub struct ClickResponse {
    pub window: Option<WindowAction>,
}

pub async fn notification_click(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClickRequest>,
) -> Result<Json<ClickResponse>, (StatusCode, String)> {
    let window = state
        .gateway
        .on_notification_click(request.action)
        .await
        .map_err(error_response)?;
    Ok(Json(ClickResponse { window }))
}
