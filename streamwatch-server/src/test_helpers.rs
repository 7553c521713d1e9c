//! Test helpers for streamwatch-server unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use streamwatch_core::{load_config, Database, DepotClient, RefreshCoordinator};
use streamwatch_types::{EngineError, Measurement, Server};

use crate::state::AppState;

pub const TEST_CONFIG: &str = "\
servers:
  - name: main
    p4port: ssl:p4:1666
    p4user: ci
    stream_mask: '*'
probe:
  timeout_secs: 5
";

/// Depot with a fixed stream list and per-stream outcomes.
#[derive(Clone, Default)]
pub struct FakeDepot {
    streams: Vec<String>,
    outcomes: HashMap<String, Result<Measurement, EngineError>>,
    latency: Duration,
}

impl FakeDepot {
    pub fn with_streams(names: &[&str]) -> Self {
        Self { streams: names.iter().map(|n| (*n).to_string()).collect(), ..Self::default() }
    }

    pub fn with_outcome(mut self, stream: &str, outcome: Result<Measurement, EngineError>) -> Self {
        self.outcomes.insert(stream.to_string(), outcome);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl DepotClient for FakeDepot {
    async fn list_streams(&self, _server: &Server) -> Result<Vec<String>, EngineError> {
        Ok(self.streams.clone())
    }

    async fn measure_stream(
        &self,
        _server: &Server,
        stream: &str,
    ) -> Result<Measurement, EngineError> {
        tokio::time::sleep(self.latency).await;
        self.outcomes.get(stream).cloned().unwrap_or(Ok(Measurement::new(1024, 2)))
    }

    async fn check_auth(&self, _server: &Server) -> Result<bool, EngineError> {
        Ok(true)
    }

    async fn login(&self, server: &Server, password: &str) -> Result<(), EngineError> {
        if password.is_empty() {
            return Err(EngineError::AuthError {
                server: server.p4port.clone(),
                message: "Password invalid.".to_string(),
            });
        }
        Ok(())
    }
}

/// Create an `AppState` over an in-memory database with one configured server.
///
/// Returns `(AppState, TempDir)`; keep `TempDir` alive for the test duration.
pub async fn test_app_state(depot: FakeDepot) -> (AppState, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let config_path = temp_dir.path().join("config.yaml");
    std::fs::write(&config_path, TEST_CONFIG).expect("failed to write test config");

    let config = load_config(&config_path).expect("test config must be valid");
    let db = Database::open_in_memory().expect("failed to open database");
    let client: Arc<dyn DepotClient> = Arc::new(depot);
    let coordinator = RefreshCoordinator::new(db, client, &config);

    let state = AppState::new_with_components(coordinator, config, config_path);
    state.sync_servers().await.expect("failed to sync test servers");

    (state, temp_dir)
}

/// Id of the single configured server.
pub fn server_id(state: &AppState) -> i64 {
    state.coordinator().registry().list().expect("registry readable")[0].id
}

/// Sync the catalog and return the id of `name`.
pub async fn stream_id(state: &AppState, name: &str) -> i64 {
    let server_id = server_id(state);
    state.coordinator().catalog().sync_streams(server_id).await.expect("sync failed");
    state
        .coordinator()
        .catalog()
        .list_streams(server_id)
        .expect("catalog readable")
        .into_iter()
        .find(|s| s.name == name)
        .map(|s| s.id)
        .expect("stream not in catalog")
}
