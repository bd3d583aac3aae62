//! Cache partition handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use std::sync::Arc;

use super::error_response;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PartitionsResponse {
    pub partitions: Vec<String>,
    pub total: usize,
}

pub async fn list_partitions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PartitionsResponse>, (StatusCode, String)> {
    let partitions: Vec<String> = state
        .gateway
        .store()
        .list_partition_names()
        .await
        .map_err(error_response)?
        .into_iter()
        .collect();

    Ok(Json(PartitionsResponse {
        total: partitions.len(),
        partitions,
    }))
}

pub async fn delete_partition(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let deleted = state
        .gateway
        .store()
        .delete_partition(&name)
        .await
        .map_err(error_response)?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            format!("Partition not found: {}", name),
        ))
    }
}
