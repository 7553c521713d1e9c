//! Application State
//!
//! Holds the refresh engine and the configuration it was started with.

mod accessors;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use streamwatch_core::utils::paths;
use streamwatch_core::{Database, DepotClient, P4CliClient, RefreshCoordinator};
use streamwatch_types::AppConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub coordinator: Arc<RefreshCoordinator>,
    pub config: RwLock<AppConfig>,
    pub config_path: PathBuf,
    pub started_at: Instant,
}

impl AppState {
    /// Create AppState around an already built engine.
    pub fn new_with_components(
        coordinator: Arc<RefreshCoordinator>,
        config: AppConfig,
        config_path: PathBuf,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                coordinator,
                config: RwLock::new(config),
                config_path,
                started_at: Instant::now(),
            }),
        }
    }

    /// Open the database in the data directory and wire the `p4` client.
    pub fn open(config: AppConfig, config_path: PathBuf) -> Result<Self> {
        let data_dir = paths::get_data_dir()
            .map_err(|e| anyhow::anyhow!("Failed to get data directory: {}", e))?;
        let db_path = paths::get_db_path().map_err(|e| anyhow::anyhow!(e))?;
        let db = Database::open(&db_path)?;

        let p4 = P4CliClient::from_config(&config.probe, &data_dir);
        p4.has_tickets();
        let client: Arc<dyn DepotClient> = Arc::new(p4);
        let coordinator = RefreshCoordinator::new(db, client, &config);

        tracing::info!("Database ready at {}", db_path.display());
        Ok(Self::new_with_components(coordinator, config, config_path))
    }
}
