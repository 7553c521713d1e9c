use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;

use super::update::{sync_server_streams, update_all, update_server, update_stream};
use crate::test_helpers::{server_id, stream_id, test_app_state, FakeDepot};
use streamwatch_core::TargetKey;
use streamwatch_types::{EngineError, Measurement};

fn unavailable() -> EngineError {
    EngineError::UpstreamUnavailable {
        server: "ssl:p4:1666".to_string(),
        message: "connection refused".to_string(),
    }
}

#[tokio::test]
async fn test_update_stream_returns_measurement() {
    let depot = FakeDepot::with_streams(&["//depot/main"])
        .with_outcome("//depot/main", Ok(Measurement::new(524_288_000, 12_000)));
    let (state, _tmp) = test_app_state(depot).await;
    let id = stream_id(&state, "//depot/main").await;

    let Json(body) = update_stream(State(state.clone()), Path(id)).await.unwrap();
    assert!(body.success);
    assert_eq!(body.size_bytes, 524_288_000);
    assert_eq!(body.file_count, 12_000);
    assert_eq!(body.human, "500.0 MiB");
    assert!(body.message.contains("//depot/main"));

    let stream = state.coordinator().catalog().get_stream(id).unwrap();
    assert_eq!(stream.size_bytes, Some(524_288_000));
    assert_eq!(stream.last_updated, Some(body.timestamp));
}

#[tokio::test]
async fn test_update_stream_blocked_while_in_flight() {
    let (state, _tmp) = test_app_state(FakeDepot::with_streams(&["//depot/main"])).await;
    let id = stream_id(&state, "//depot/main").await;
    let held = state.coordinator().inflight().try_acquire(TargetKey::Stream(id)).unwrap();

    let (status, Json(err)) = update_stream(State(state.clone()), Path(id)).await.unwrap_err();
    assert_eq!(status, StatusCode::LOCKED);
    assert!(!err.success);

    drop(held);
    assert!(update_stream(State(state), Path(id)).await.is_ok());
}

#[tokio::test]
async fn test_update_stream_upstream_failure_keeps_cache() {
    let depot = FakeDepot::with_streams(&["//depot/main"])
        .with_outcome("//depot/main", Err(unavailable()));
    let (state, _tmp) = test_app_state(depot).await;
    let id = stream_id(&state, "//depot/main").await;

    let (status, Json(err)) = update_stream(State(state.clone()), Path(id)).await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(err.error.contains("connection refused"));

    let stream = state.coordinator().catalog().get_stream(id).unwrap();
    assert_eq!(stream.size_bytes, None);
    assert_eq!(state.coordinator().history().count().unwrap(), 0);
}

#[tokio::test]
async fn test_update_stream_invalid_ids() {
    let (state, _tmp) = test_app_state(FakeDepot::default()).await;

    let (status, _) = update_stream(State(state.clone()), Path(0)).await.unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = update_stream(State(state), Path(77)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_server_counts_partial_failure() {
    let depot = FakeDepot::with_streams(&["//depot/main", "//depot/rel1"])
        .with_outcome("//depot/main", Ok(Measurement::new(524_288_000, 12_000)))
        .with_outcome("//depot/rel1", Err(unavailable()));
    let (state, _tmp) = test_app_state(depot).await;
    let main = stream_id(&state, "//depot/main").await;
    let rel1 = stream_id(&state, "//depot/rel1").await;

    let Json(body) = update_server(State(state.clone()), Path(server_id(&state))).await.unwrap();
    assert_eq!(body.updated, 1);
    assert_eq!(body.failed, 1);
    assert_eq!(body.skipped, 0);
    assert_eq!(body.added, 0);

    let catalog = state.coordinator().catalog();
    assert_eq!(catalog.get_stream(main).unwrap().size_bytes, Some(524_288_000));
    assert_eq!(catalog.get_stream(rel1).unwrap().size_bytes, None);
}

#[tokio::test]
async fn test_update_server_unknown() {
    let (state, _tmp) = test_app_state(FakeDepot::default()).await;

    let (status, _) = update_server(State(state), Path(31)).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_server_streams() {
    let depot = FakeDepot::with_streams(&["//depot/main", "//depot/rel1"]);
    let (state, _tmp) = test_app_state(depot).await;
    let id = server_id(&state);

    let Json(body) = sync_server_streams(State(state.clone()), Path(id)).await.unwrap();
    assert_eq!((body.added, body.removed, body.total), (2, 0, 2));

    let Json(body) = sync_server_streams(State(state), Path(id)).await.unwrap();
    assert_eq!((body.added, body.removed, body.total), (0, 0, 2));
}

#[tokio::test]
async fn test_update_all_is_fire_and_forget() {
    let depot = FakeDepot::with_streams(&["//depot/main", "//depot/rel1"])
        .with_latency(Duration::from_millis(100));
    let (state, _tmp) = test_app_state(depot).await;
    stream_id(&state, "//depot/main").await;

    let Json(body) = update_all(State(state.clone())).await.unwrap();
    assert!(body.success);
    assert_eq!(body.message, "Update of all streams started");

    // The first run still holds the global key
    let (status, _) = update_all(State(state.clone())).await.unwrap_err();
    assert_eq!(status, StatusCode::LOCKED);

    let inflight = state.coordinator().inflight().clone();
    for _ in 0..100 {
        if !inflight.is_held(&TargetKey::All) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!inflight.is_held(&TargetKey::All));
    assert_eq!(state.coordinator().history().count().unwrap(), 2);
}
