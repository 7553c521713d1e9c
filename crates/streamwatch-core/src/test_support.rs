//! In-process fakes shared by the unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::params;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use streamwatch_types::{AppConfig, EngineError, Measurement, Server, ServerEntry};

use crate::depot::DepotClient;
use crate::modules::{
    Database, HistoryStore, InFlightSet, RefreshCoordinator, ServerRegistry, StreamCatalog,
};

pub(crate) const TEST_PORT: &str = "ssl:p4:1666";

#[derive(Default)]
struct Script {
    streams: Vec<String>,
    outcomes: HashMap<String, Result<Measurement, EngineError>>,
    listing_error: Option<EngineError>,
    latency: Duration,
    authenticated: bool,
    password: Option<String>,
}

/// Depot client answering from a script instead of a real server.
#[derive(Clone, Default)]
pub(crate) struct ScriptedDepot {
    script: Arc<Mutex<Script>>,
    measure_calls: Arc<AtomicUsize>,
}

impl ScriptedDepot {
    pub(crate) fn new() -> Self {
        let depot = Self::default();
        depot.script.lock().authenticated = true;
        depot
    }

    pub(crate) fn with_streams(self, names: &[&str]) -> Self {
        self.set_streams(names);
        self
    }

    /// Require `password` for login; the depot starts logged out.
    pub(crate) fn with_password(self, password: &str) -> Self {
        {
            let mut script = self.script.lock();
            script.password = Some(password.to_string());
            script.authenticated = false;
        }
        self
    }

    pub(crate) fn with_latency(self, latency: Duration) -> Self {
        self.script.lock().latency = latency;
        self
    }

    pub(crate) fn with_outcome(
        self,
        stream: &str,
        outcome: Result<Measurement, EngineError>,
    ) -> Self {
        self.set_outcome(stream, outcome);
        self
    }

    pub(crate) fn set_streams(&self, names: &[&str]) {
        self.script.lock().streams = names.iter().map(|n| (*n).to_string()).collect();
    }

    pub(crate) fn set_outcome(&self, stream: &str, outcome: Result<Measurement, EngineError>) {
        self.script.lock().outcomes.insert(stream.to_string(), outcome);
    }

    pub(crate) fn set_latency(&self, latency: Duration) {
        self.script.lock().latency = latency;
    }

    pub(crate) fn fail_listing(&self, error: EngineError) {
        self.script.lock().listing_error = Some(error);
    }

    pub(crate) fn measure_calls(&self) -> usize {
        self.measure_calls.load(Ordering::SeqCst)
    }

    fn latency(&self) -> Duration {
        self.script.lock().latency
    }
}

#[async_trait]
impl DepotClient for ScriptedDepot {
    async fn list_streams(&self, _server: &Server) -> Result<Vec<String>, EngineError> {
        tokio::time::sleep(self.latency()).await;
        let script = self.script.lock();
        match &script.listing_error {
            Some(e) => Err(e.clone()),
            None => Ok(script.streams.clone()),
        }
    }

    async fn measure_stream(
        &self,
        _server: &Server,
        stream: &str,
    ) -> Result<Measurement, EngineError> {
        self.measure_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency()).await;
        self.script.lock().outcomes.get(stream).cloned().unwrap_or(Ok(Measurement::EMPTY))
    }

    async fn check_auth(&self, _server: &Server) -> Result<bool, EngineError> {
        Ok(self.script.lock().authenticated)
    }

    async fn login(&self, server: &Server, password: &str) -> Result<(), EngineError> {
        tokio::time::sleep(self.latency()).await;
        let mut script = self.script.lock();
        if script.password.as_deref().is_some_and(|expected| expected != password) {
            return Err(EngineError::AuthError {
                server: server.p4port.clone(),
                message: "Password invalid.".to_string(),
            });
        }
        script.authenticated = true;
        Ok(())
    }
}

/// Insert a server and one stream directly. Returns the stream id.
pub(crate) fn seed_stream(db: &Database, p4port: &str, name: &str) -> i64 {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR IGNORE INTO servers (name, p4port, p4user, stream_mask, active, position, created_at)
             VALUES (?1, ?1, 'ci', '*role*', 1, 0, 0)",
            params![p4port],
        )?;
        let server_id: i64 =
            conn.query_row("SELECT id FROM servers WHERE p4port = ?1", params![p4port], |row| {
                row.get(0)
            })?;
        conn.execute(
            "INSERT INTO streams (server_id, name) VALUES (?1, ?2)",
            params![server_id, name],
        )?;
        Ok(conn.last_insert_rowid())
    })
    .unwrap()
}

/// A fully wired engine over an in-memory database with one server.
pub(crate) struct TestEngine {
    pub(crate) coordinator: Arc<RefreshCoordinator>,
    pub(crate) registry: ServerRegistry,
    pub(crate) catalog: StreamCatalog,
    pub(crate) history: HistoryStore,
    pub(crate) inflight: InFlightSet,
    pub(crate) server_id: i64,
}

impl TestEngine {
    pub(crate) fn stream_id(&self, name: &str) -> i64 {
        self.catalog
            .list_streams(self.server_id)
            .unwrap()
            .into_iter()
            .find(|s| s.name == name)
            .map(|s| s.id)
            .unwrap()
    }
}

pub(crate) fn engine_with(depot: ScriptedDepot) -> TestEngine {
    engine_with_timeout(depot, Duration::from_secs(5), &AppConfig::default())
}

pub(crate) fn engine_with_timeout(
    depot: ScriptedDepot,
    timeout: Duration,
    config: &AppConfig,
) -> TestEngine {
    let inflight = InFlightSet::new(Duration::from_secs(config.inflight.stale_after_secs));
    engine_with_inflight(depot, timeout, inflight, config)
}

/// Engine sharing a caller-built admission set, e.g. one with a tiny TTL.
pub(crate) fn engine_with_inflight(
    depot: ScriptedDepot,
    timeout: Duration,
    inflight: InFlightSet,
    config: &AppConfig,
) -> TestEngine {
    let db = Database::open_in_memory().unwrap();
    let coordinator =
        RefreshCoordinator::with_parts(db, Arc::new(depot), inflight.clone(), timeout, config);

    coordinator
        .registry()
        .sync_from_config(&[ServerEntry {
            name: "main".to_string(),
            p4port: TEST_PORT.to_string(),
            p4user: "ci".to_string(),
            stream_mask: "*".to_string(),
            password: None,
        }])
        .unwrap();
    let server_id = coordinator.registry().list().unwrap()[0].id;

    TestEngine {
        registry: coordinator.registry().clone(),
        catalog: coordinator.catalog().clone(),
        history: coordinator.history().clone(),
        inflight,
        server_id,
        coordinator,
    }
}
