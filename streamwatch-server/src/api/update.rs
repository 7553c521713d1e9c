//! Refresh and catalog sync handlers

use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use streamwatch_core::utils::format::human_size;

use super::{api_error, valid_id, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UpdateStreamResponse {
    pub success: bool,
    pub size_bytes: u64,
    pub file_count: u64,
    pub human: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

pub async fn update_stream(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<UpdateStreamResponse> {
    let id = valid_id(id, "stream_id")?;
    let refreshed = state.coordinator().refresh_stream(id).await.map_err(|e| api_error(&e))?;

    let human = human_size(refreshed.measurement.size_bytes);
    let message = format!(
        "Stream {} updated: {}, {} files",
        refreshed.stream.name, human, refreshed.measurement.file_count
    );
    Ok(Json(UpdateStreamResponse {
        success: true,
        size_bytes: refreshed.measurement.size_bytes,
        file_count: refreshed.measurement.file_count,
        human,
        timestamp: refreshed.recorded_at,
        message,
    }))
}

#[derive(Debug, Serialize)]
pub struct UpdateServerResponse {
    pub success: bool,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub async fn update_server(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<UpdateServerResponse> {
    let id = valid_id(id, "server_id")?;
    let stats = state.coordinator().refresh_server(id).await.map_err(|e| api_error(&e))?;

    Ok(Json(UpdateServerResponse {
        success: true,
        added: stats.added,
        updated: stats.updated,
        removed: stats.removed,
        failed: stats.failed,
        skipped: stats.skipped,
    }))
}

#[derive(Debug, Serialize)]
pub struct SyncStreamsResponse {
    pub success: bool,
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

pub async fn sync_server_streams(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<SyncStreamsResponse> {
    let id = valid_id(id, "server_id")?;
    let stats = state.coordinator().catalog().sync_streams(id).await.map_err(|e| api_error(&e))?;

    Ok(Json(SyncStreamsResponse {
        success: true,
        added: stats.added,
        removed: stats.removed,
        total: stats.total,
    }))
}

#[derive(Debug, Serialize)]
pub struct UpdateAllResponse {
    pub success: bool,
    pub message: String,
}

/// Admit a global refresh and return at once; the work runs in the
/// background and callers reload after a delay.
pub async fn update_all(State(state): State<AppState>) -> ApiResult<UpdateAllResponse> {
    let handle = state.coordinator().start_refresh_all().map_err(|e| api_error(&e))?;

    tokio::spawn(async move {
        match handle.await {
            Ok(stats) => tracing::info!(
                "Background update finished: {} updated, {} failed, {} skipped",
                stats.updated,
                stats.failed,
                stats.skipped
            ),
            Err(e) => tracing::error!("Background update panicked: {}", e),
        }
    });

    Ok(Json(UpdateAllResponse { success: true, message: "Update of all streams started".to_string() }))
}
