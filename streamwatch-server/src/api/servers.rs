//! Server registry handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Serialize;

use streamwatch_types::models::ServerOverview;
use streamwatch_types::Server;

use super::{api_error, status_for, valid_id, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SyncServersResponse {
    pub status: &'static str,
    pub message: String,
}

/// `{status, message}` on both outcomes; the status code tells them apart.
pub async fn sync_servers(
    State(state): State<AppState>,
) -> Result<Json<SyncServersResponse>, (StatusCode, Json<SyncServersResponse>)> {
    match state.sync_servers().await {
        Ok(stats) => Ok(Json(SyncServersResponse { status: "success", message: stats.message() })),
        Err(e) => {
            tracing::warn!("Server sync failed: {}", e);
            Err((status_for(&e), Json(SyncServersResponse { status: "error", message: e.to_string() })))
        },
    }
}

#[derive(Debug, Serialize)]
pub struct ServersResponse {
    pub success: bool,
    pub count: usize,
    pub servers: Vec<ServerOverview>,
}

pub async fn list_servers(State(state): State<AppState>) -> ApiResult<ServersResponse> {
    let servers = state.coordinator().registry().overview().map_err(|e| api_error(&e))?;
    Ok(Json(ServersResponse { success: true, count: servers.len(), servers }))
}

#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub success: bool,
    pub server: Server,
}

pub async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ServerResponse> {
    let id = valid_id(id, "server_id")?;
    let server = state.coordinator().registry().get(id).map_err(|e| api_error(&e))?;
    Ok(Json(ServerResponse { success: true, server }))
}

#[derive(Debug, Serialize)]
pub struct ServerStreamsResponse {
    pub success: bool,
    pub server: String,
    pub count: usize,
    pub streams: Vec<String>,
}

/// Cached stream names of one server; never contacts the depot.
pub async fn list_server_streams(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<ServerStreamsResponse> {
    let id = valid_id(id, "server_id")?;
    let coordinator = state.coordinator();
    let server = coordinator.registry().get(id).map_err(|e| api_error(&e))?;
    let streams: Vec<String> = coordinator
        .catalog()
        .list_streams(id)
        .map_err(|e| api_error(&e))?
        .into_iter()
        .map(|s| s.name)
        .collect();

    Ok(Json(ServerStreamsResponse {
        success: true,
        server: server.name,
        count: streams.len(),
        streams,
    }))
}

#[derive(Debug, Serialize)]
pub struct ServerAuthStatus {
    pub server_id: i64,
    pub server_name: String,
    pub p4port: String,
    pub p4user: String,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthCheckResponse {
    pub success: bool,
    pub servers: Vec<ServerAuthStatus>,
}

pub async fn check_auth(State(state): State<AppState>) -> ApiResult<AuthCheckResponse> {
    let coordinator = state.coordinator();
    let servers = coordinator.registry().list_active().map_err(|e| api_error(&e))?;

    let mut statuses = Vec::with_capacity(servers.len());
    for server in servers {
        let (authenticated, error) = match coordinator.check_auth(server.id).await {
            Ok(ok) => (ok, None),
            Err(e) => (false, Some(e.to_string())),
        };
        statuses.push(ServerAuthStatus {
            server_id: server.id,
            server_name: server.name,
            p4port: server.p4port,
            p4user: server.p4user,
            authenticated,
            error,
        });
    }

    Ok(Json(AuthCheckResponse { success: true, servers: statuses }))
}
