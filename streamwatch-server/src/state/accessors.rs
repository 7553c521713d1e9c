//! Accessor methods for AppState

use std::path::Path;
use std::sync::Arc;

use streamwatch_core::{load_config, AppResult, RefreshCoordinator};
use streamwatch_types::models::{HistoryConfig, HttpConfig, SchedulerConfig, ServerSyncStats};
use streamwatch_types::ServerEntry;

use super::AppState;

impl AppState {
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.inner.coordinator
    }

    pub fn config_path(&self) -> &Path {
        &self.inner.config_path
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    pub async fn history_config(&self) -> HistoryConfig {
        self.inner.config.read().await.history.clone()
    }

    pub async fn scheduler_config(&self) -> SchedulerConfig {
        self.inner.config.read().await.scheduler.clone()
    }

    pub async fn http_config(&self) -> HttpConfig {
        self.inner.config.read().await.http.clone()
    }

    pub async fn server_entries(&self) -> Vec<ServerEntry> {
        self.inner.config.read().await.servers.clone()
    }

    /// Reconcile servers with the config file and keep its other sections
    /// for later requests.
    pub async fn sync_servers(&self) -> AppResult<ServerSyncStats> {
        let coordinator = Arc::clone(&self.inner.coordinator);
        let path = self.inner.config_path.clone();
        let stats = tokio::task::spawn_blocking(move || coordinator.sync_servers_from_config(&path))
            .await
            .map_err(|e| std::io::Error::other(format!("spawn_blocking panicked: {e}")))??;

        match load_config(&self.inner.config_path) {
            Ok(config) => *self.inner.config.write().await = config,
            Err(e) => tracing::warn!("Config changed during sync, keeping previous: {}", e),
        }
        Ok(stats)
    }
}
