//! Background sync and offline queue handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use enchat_core::http::Headers;
use enchat_core::ports::PendingAction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error_response;
use crate::state::AppState;

/// Replays the queue when `tag` is the registered one; `204` otherwise.
pub async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let report = state
        .gateway
        .on_sync(&tag)
        .await
        .map_err(error_response)?;

    Ok(match report {
        Some(report) => Json(report).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

#[derive(Serialize)]
pub struct QueueResponse {
    pub actions: Vec<PendingAction>,
    pub total: usize,
}

pub async fn list_queue(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueResponse>, (StatusCode, String)> {
    let actions = state
        .gateway
        .queue()
        .pending()
        .await
        .map_err(error_response)?;

    Ok(Json(QueueResponse {
        total: actions.len(),
        actions,
    }))
}

#[derive(Deserialize)]
pub struct EnqueueRequest {
    pub path: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<PendingAction>), (StatusCode, String)> {
    if !request.path.starts_with('/') {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("path must be absolute: {}", request.path),
        ));
    }

    let mut action = PendingAction::new(request.path, request.body);
    if let Some(method) = request.method {
        action.method = method.to_uppercase();
    }
    action.headers = request.headers;

    state
        .gateway
        .queue()
        .enqueue(action.clone())
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(action)))
}
