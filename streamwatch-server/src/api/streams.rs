//! Stream catalog and history handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use streamwatch_core::utils::format::human_size;
use streamwatch_types::Stream;

use super::{api_error, bad_request, valid_id, ApiResult};
use crate::state::AppState;

const DEFAULT_PER_PAGE: usize = 50;
const MAX_PER_PAGE: usize = 200;
const MIN_SEARCH_LEN: usize = 2;
const MAX_SEARCH_LEN: usize = 100;
const SEARCH_LIMIT: usize = 50;

/// A cached stream plus its formatted size.
#[derive(Debug, Serialize)]
pub struct StreamView {
    #[serde(flatten)]
    pub stream: Stream,
    pub human: Option<String>,
}

impl From<Stream> for StreamView {
    fn from(stream: Stream) -> Self {
        let human = stream.size_bytes.map(human_size);
        Self { stream, human }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub server_id: Option<i64>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
    pub total: u64,
    pub pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Debug, Serialize)]
pub struct StreamListResponse {
    pub success: bool,
    pub streams: Vec<StreamView>,
    pub pagination: Pagination,
}

pub async fn list_streams(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<StreamListResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let server_id = query.server_id.map(|id| valid_id(id, "server_id")).transpose()?;

    let (streams, total) =
        state.coordinator().catalog().page(server_id, page, per_page).map_err(|e| api_error(&e))?;
    let pages = total.div_ceil(per_page as u64);

    Ok(Json(StreamListResponse {
        success: true,
        streams: streams.into_iter().map(StreamView::from).collect(),
        pagination: Pagination {
            page,
            per_page,
            total,
            pages,
            has_prev: page > 1,
            has_next: (page as u64) < pages,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub success: bool,
    pub stream: StreamView,
}

pub async fn get_stream(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StreamResponse> {
    let id = valid_id(id, "stream_id")?;
    let stream = state.coordinator().catalog().get_stream(id).map_err(|e| api_error(&e))?;
    Ok(Json(StreamResponse { success: true, stream: stream.into() }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub query: String,
    pub count: usize,
    pub streams: Vec<StreamView>,
}

pub async fn search_streams(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let q = query.q.trim().to_string();
    let len = q.chars().count();
    if len < MIN_SEARCH_LEN {
        return Err(bad_request("q", format!("must be at least {MIN_SEARCH_LEN} characters")));
    }
    if len > MAX_SEARCH_LEN {
        return Err(bad_request("q", format!("must be at most {MAX_SEARCH_LEN} characters")));
    }

    let streams =
        state.coordinator().catalog().search(&q, SEARCH_LIMIT).map_err(|e| api_error(&e))?;
    tracing::debug!("Search '{}' matched {} streams", q, streams.len());

    Ok(Json(SearchResponse {
        success: true,
        query: q,
        count: streams.len(),
        streams: streams.into_iter().map(StreamView::from).collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<u32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub size_bytes: u64,
    pub file_count: u64,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub stream_id: i64,
    pub stream_name: String,
    pub days: u32,
    pub history: Vec<HistoryPoint>,
}

/// Records of the last `days` days, oldest first, at most `limit` of them.
pub async fn get_stream_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let id = valid_id(id, "stream_id")?;
    if query.days == Some(0) {
        return Err(bad_request("days", "must be a positive integer"));
    }
    if query.limit == Some(0) {
        return Err(bad_request("limit", "must be a positive integer"));
    }

    let limits = state.history_config().await;
    let days = limits.clamp_days(query.days);
    let limit = limits.clamp_limit(query.limit);

    let coordinator = state.coordinator();
    let stream = coordinator.catalog().get_stream(id).map_err(|e| api_error(&e))?;
    let records =
        coordinator.history().query_recent(id, days, limit).map_err(|e| api_error(&e))?;

    Ok(Json(HistoryResponse {
        success: true,
        stream_id: stream.id,
        stream_name: stream.name,
        days,
        history: records
            .into_iter()
            .map(|r| HistoryPoint {
                timestamp: r.recorded_at,
                size_bytes: r.size_bytes,
                file_count: r.file_count,
            })
            .collect(),
    }))
}
