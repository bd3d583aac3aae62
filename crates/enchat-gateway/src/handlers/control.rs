//! Control message and install handlers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::error_response;
use crate::control::ControlReply;
use crate::lifecycle::InstallOutcome;
use crate::state::AppState;

/// `GET_VERSION` replies with JSON; everything else with `204`.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<Response, (StatusCode, String)> {
    let reply = state
        .gateway
        .on_message(&payload)
        .await
        .map_err(error_response)?;

    Ok(match reply {
        ControlReply::Version(version) => Json(version).into_response(),
        ControlReply::SkipWaiting { .. } | ControlReply::Ignored => {
            StatusCode::NO_CONTENT.into_response()
        }
    })
}

#[derive(Deserialize)]
pub struct InstallRequest {
    pub version: String,
}

pub async fn install(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InstallRequest>,
) -> Result<Json<InstallOutcome>, (StatusCode, String)> {
    state
        .gateway
        .install_version(&request.version)
        .await
        .map(Json)
        .map_err(error_response)
}
