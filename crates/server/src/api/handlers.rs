use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use mediashelf_core::{IndexSummary, QueueStatus, SanitizedConfig};

use super::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub transcoder: String,
    pub queue: QueueStatus,
    /// Derived assets currently being generated.
    pub generating: usize,
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        transcoder: state.transcoder().name().to_string(),
        queue: state.queue_status(),
        generating: state.assets().in_flight().await,
    })
}

#[derive(Serialize)]
pub struct RescanResponse {
    pub directories: usize,
    pub files: usize,
}

impl From<IndexSummary> for RescanResponse {
    fn from(summary: IndexSummary) -> Self {
        Self {
            directories: summary.directories,
            files: summary.files,
        }
    }
}

/// Re-index the library from scratch
pub async fn rescan(State(state): State<Arc<AppState>>) -> Result<Json<RescanResponse>, ApiError> {
    let summary = state.rescan().await?;
    Ok(Json(summary.into()))
}
