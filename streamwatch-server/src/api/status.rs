//! Engine totals and in-flight operations

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use streamwatch_core::metrics;
use streamwatch_core::utils::format::human_size;
use streamwatch_types::models::{EngineStats, InFlightEntry};

use super::{api_error, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: EngineStats,
    pub total_size_human: String,
}

pub async fn get_stats(State(state): State<AppState>) -> ApiResult<StatsResponse> {
    let stats = state.coordinator().stats().map_err(|e| api_error(&e))?;
    Ok(Json(StatsResponse {
        success: true,
        total_size_human: human_size(stats.total_size_bytes),
        stats,
    }))
}

#[derive(Debug, Serialize)]
pub struct LocksResponse {
    pub success: bool,
    pub count: usize,
    pub locks: Vec<InFlightEntry>,
}

pub async fn get_locks(State(state): State<AppState>) -> Json<LocksResponse> {
    let locks = state.coordinator().inflight().snapshot();
    Json(LocksResponse { success: true, count: locks.len(), locks })
}

/// Prometheus scrape endpoint.
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    let coordinator = state.coordinator();
    let streams = match coordinator.catalog().totals() {
        Ok((streams, _, _)) => streams,
        Err(e) => {
            tracing::warn!("Stream totals unavailable for metrics: {}", e);
            0
        },
    };
    metrics::update_engine_gauges(coordinator.inflight().len(), streams);

    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], metrics::render_metrics())
        .into_response()
}
