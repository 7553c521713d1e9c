//! API Routes
//!
//! REST endpoints over the refresh engine. Every body is JSON; failures carry
//! `{"success": false, "error": "..."}` with a status derived from the error.

mod servers;
pub(crate) mod status;
mod streams;
mod update;

#[cfg(test)]
mod update_tests;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;

use streamwatch_core::AppError;
use streamwatch_types::EngineError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Status
        .route("/status", get(get_status))
        .route("/status/locks", get(status::get_locks))
        .route("/stats", get(status::get_stats))
        // Servers
        .route("/admin/sync-servers", post(servers::sync_servers))
        .route("/servers", get(servers::list_servers))
        .route("/server/:id", get(servers::get_server))
        .route("/server/:id/streams", get(servers::list_server_streams))
        .route("/auth/check", get(servers::check_auth))
        // Streams
        .route("/streams", get(streams::list_streams))
        .route("/streams/search", get(streams::search_streams))
        .route("/stream/:id", get(streams::get_stream))
        .route("/stream/:id/history", get(streams::get_stream_history))
        // Refresh
        .route("/update/all", post(update::update_all))
        .route("/update/server/:id", post(update::update_server))
        .route("/update/server/:id/sync-streams", post(update::sync_server_streams))
        .route("/update/stream/:id", post(update::update_stream))
        // API fallback: return 404 for unknown API endpoints
        .fallback(api_not_found)
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);
pub(crate) type ApiResult<T> = Result<Json<T>, ApiError>;

pub(crate) fn status_for(e: &AppError) -> StatusCode {
    match e {
        AppError::Engine(engine) => match engine {
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::OperationBlocked { .. } => StatusCode::LOCKED,
            EngineError::Validation { .. } => StatusCode::BAD_REQUEST,
            EngineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            EngineError::UpstreamUnavailable { .. } | EngineError::AuthError { .. } => {
                StatusCode::BAD_GATEWAY
            },
            EngineError::DuplicateTimestamp { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
        AppError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn api_error(e: &AppError) -> ApiError {
    let status = status_for(e);
    if status.is_server_error() {
        tracing::error!("API error ({}): {}", status, e);
    } else {
        tracing::debug!("API error ({}): {}", status, e);
    }
    (status, Json(ErrorResponse { success: false, error: e.to_string() }))
}

pub(crate) fn bad_request(field: &str, message: impl Into<String>) -> ApiError {
    api_error(&AppError::Engine(EngineError::Validation {
        field: field.to_string(),
        message: message.into(),
    }))
}

/// Reject non-positive path ids before touching storage.
pub(crate) fn valid_id(id: i64, field: &str) -> Result<i64, ApiError> {
    if id > 0 {
        Ok(id)
    } else {
        Err(bad_request(field, format!("must be a positive integer, got {id}")))
    }
}

async fn api_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { success: false, error: "Not found".to_string() }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub servers: usize,
    pub active_servers: usize,
    pub in_flight: usize,
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let servers = state.coordinator().registry().list().map_err(|e| api_error(&e))?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        servers: servers.len(),
        active_servers: servers.iter().filter(|s| s.active).count(),
        in_flight: state.coordinator().inflight().len(),
    }))
}
