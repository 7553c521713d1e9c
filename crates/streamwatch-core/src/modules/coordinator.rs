//! Refresh orchestration.
//!
//! Every refresh scope takes its own admission key first:
//!
//! ```text
//! refresh_all ── key "all"
//!   └─ refresh_server ── key "server:<id>"
//!        └─ refresh_stream ── key "stream:<id>"   (bounded parallelism)
//! ```
//!
//! A server or global refresh never bypasses per-stream exclusivity: each
//! stream is admitted individually, and a stream held elsewhere is counted as
//! skipped. Failures are counted, never propagated out of a batch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

use streamwatch_types::models::{EngineStats, ServerSyncStats};
use streamwatch_types::{AppConfig, EngineError, Measurement, RefreshStats, Stream};

use super::catalog::StreamCatalog;
use super::config::load_server_entries;
use super::database::Database;
use super::history::HistoryStore;
use super::inflight::{InFlightGuard, InFlightSet, TargetKey};
use super::metrics;
use super::probe::SizeProbe;
use super::registry::ServerRegistry;
use crate::depot::DepotClient;
use crate::error::AppResult;
use crate::utils::time::now_ms;

/// Outcome of a single stream refresh.
#[derive(Debug, Clone, Serialize)]
pub struct StreamRefresh {
    /// Stream after the cached fields were updated
    pub stream: Stream,
    pub measurement: Measurement,
    pub recorded_at: DateTime<Utc>,
    /// False when the history write was coalesced away
    pub history_written: bool,
}

pub struct RefreshCoordinator {
    registry: ServerRegistry,
    catalog: StreamCatalog,
    history: HistoryStore,
    probe: SizeProbe,
    client: Arc<dyn DepotClient>,
    inflight: InFlightSet,
    max_parallel: usize,
    skip_unchanged: bool,
}

impl RefreshCoordinator {
    pub fn new(db: Database, client: Arc<dyn DepotClient>, config: &AppConfig) -> Arc<Self> {
        let timeout = Duration::from_secs(config.probe.timeout_secs);
        let inflight = InFlightSet::new(Duration::from_secs(config.inflight.stale_after_secs));
        Self::with_parts(db, client, inflight, timeout, config)
    }

    /// Like `new`, with explicit deadline and admission set.
    pub fn with_parts(
        db: Database,
        client: Arc<dyn DepotClient>,
        inflight: InFlightSet,
        timeout: Duration,
        config: &AppConfig,
    ) -> Arc<Self> {
        let registry = ServerRegistry::new(db.clone());
        let catalog = StreamCatalog::new(
            db.clone(),
            registry.clone(),
            Arc::clone(&client),
            inflight.clone(),
            timeout,
        );

        Arc::new(Self {
            registry,
            catalog,
            history: HistoryStore::new(db),
            probe: SizeProbe::new(Arc::clone(&client), timeout),
            client,
            inflight,
            max_parallel: config.probe.max_parallel.max(1),
            skip_unchanged: config.history.skip_unchanged,
        })
    }

    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &StreamCatalog {
        &self.catalog
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn inflight(&self) -> &InFlightSet {
        &self.inflight
    }

    /// Reconcile the registry with the `servers` section of a config file.
    pub fn sync_servers_from_config(&self, path: &Path) -> AppResult<ServerSyncStats> {
        let _guard = self.inflight.try_acquire(TargetKey::ConfigSync)?;
        let entries = load_server_entries(path)?;
        self.registry.sync_from_config(&entries)
    }

    /// Measure one stream and record the result.
    ///
    /// On failure the cached size stays as it was.
    pub async fn refresh_stream(&self, stream_id: i64) -> AppResult<StreamRefresh> {
        let _guard = self.inflight.try_acquire(TargetKey::Stream(stream_id)).inspect_err(|_| {
            metrics::record_measurement_blocked();
        })?;

        let stream = self.catalog.get_stream(stream_id)?;
        if stream.deleted {
            return Err(EngineError::stream_not_found(stream_id).into());
        }
        let server = self.registry.get(stream.server_id)?;

        let measurement = match self.probe.probe(&server, &stream).await {
            Ok(m) => m,
            Err(e) if e.is_transient() => {
                tracing::warn!("[Coordinator] Measuring {} failed, retried next run: {}", stream.name, e);
                return Err(e.into());
            },
            Err(e) => {
                tracing::error!("[Coordinator] Measuring {} failed: {}", stream.name, e);
                return Err(e.into());
            },
        };

        let recorded_at = now_ms();
        let unchanged = self.skip_unchanged && stream.measurement() == Some(measurement);
        if unchanged {
            tracing::debug!("[Coordinator] {} unchanged, history not written", stream.name);
        }
        let history_written =
            self.history.record(stream_id, recorded_at, measurement, !unchanged)?.is_some();

        tracing::info!(
            "[Coordinator] {} on {}: {} bytes, {} files",
            stream.name,
            server.name,
            measurement.size_bytes,
            measurement.file_count
        );

        let stream = Stream {
            size_bytes: Some(measurement.size_bytes),
            file_count: Some(measurement.file_count),
            last_updated: Some(recorded_at),
            ..stream
        };
        Ok(StreamRefresh { stream, measurement, recorded_at, history_written })
    }

    /// Refresh every cached stream of a server.
    pub async fn refresh_server(self: &Arc<Self>, server_id: i64) -> AppResult<RefreshStats> {
        let _guard = self.inflight.try_acquire(TargetKey::Server(server_id))?;

        let server = self.registry.get(server_id)?;
        let streams = self.catalog.list_streams(server_id)?;
        tracing::info!("[Coordinator] Refreshing {} streams on {}", streams.len(), server.name);

        let stats = self.refresh_streams(streams).await;
        tracing::info!(
            "[Coordinator] Server {} done: {} updated, {} failed, {} skipped",
            server.name,
            stats.updated,
            stats.failed,
            stats.skipped
        );
        Ok(stats)
    }

    /// Refresh every stream of every active server.
    pub async fn refresh_all(self: &Arc<Self>) -> AppResult<RefreshStats> {
        self.mass_update(false).await
    }

    /// Global refresh, optionally reconciling each catalog first.
    pub async fn mass_update(self: &Arc<Self>, sync_streams: bool) -> AppResult<RefreshStats> {
        let guard = self.inflight.try_acquire(TargetKey::All)?;
        Ok(Arc::clone(self).run_mass_update(guard, sync_streams).await)
    }

    /// Admit a global refresh now and run it in the background.
    pub fn start_refresh_all(self: &Arc<Self>) -> AppResult<JoinHandle<RefreshStats>> {
        let guard = self.inflight.try_acquire(TargetKey::All)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.run_mass_update(guard, false).await }))
    }

    async fn run_mass_update(self: Arc<Self>, guard: InFlightGuard, sync_streams: bool) -> RefreshStats {
        let _guard = guard;
        let mut total = RefreshStats::default();

        let servers = match self.registry.list_active() {
            Ok(servers) => servers,
            Err(e) => {
                tracing::error!("[Coordinator] Cannot list servers: {}", e);
                return total;
            },
        };
        tracing::info!("[Coordinator] Mass update over {} servers", servers.len());

        for server in servers {
            if sync_streams {
                match self.catalog.sync_streams(server.id).await {
                    Ok(synced) => {
                        total.added += synced.added;
                        total.removed += synced.removed;
                    },
                    Err(e) => {
                        tracing::warn!("[Coordinator] Stream sync for {} failed: {}", server.name, e);
                    },
                }
            }

            match self.refresh_server(server.id).await {
                Ok(stats) => total.merge(&stats),
                Err(e) => {
                    let pending = self.catalog.list_streams(server.id).map_or(0, |s| s.len());
                    if e.is_blocked() {
                        tracing::warn!("[Coordinator] Server {} busy, skipped", server.name);
                        total.skipped += pending;
                    } else {
                        tracing::warn!("[Coordinator] Server {} failed: {}", server.name, e);
                        total.failed += pending;
                    }
                },
            }
        }

        tracing::info!(
            "[Coordinator] Mass update done: +{} ~{} -{} failed {} skipped {}",
            total.added,
            total.updated,
            total.removed,
            total.failed,
            total.skipped
        );
        total
    }

    async fn refresh_streams(self: &Arc<Self>, streams: Vec<Stream>) -> RefreshStats {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut join_set: JoinSet<(String, AppResult<StreamRefresh>)> = JoinSet::new();

        for stream in streams {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    tracing::error!("[Coordinator] Semaphore error: {}", e);
                    break;
                },
            };
            let this = Arc::clone(self);
            join_set.spawn(async move {
                let _permit = permit;
                let result = this.refresh_stream(stream.id).await;
                (stream.name, result)
            });
        }

        let mut stats = RefreshStats::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(_))) => stats.updated += 1,
                Ok((name, Err(e))) if e.is_blocked() => {
                    tracing::debug!("[Coordinator] {} already in flight, skipped", name);
                    stats.skipped += 1;
                },
                Ok((name, Err(e))) => {
                    tracing::debug!("[Coordinator] {} failed: {}", name, e);
                    stats.failed += 1;
                },
                Err(e) => {
                    tracing::error!("[Coordinator] Task panicked: {}", e);
                    stats.failed += 1;
                },
            }
        }
        stats
    }

    /// Whether the server's user holds a valid ticket.
    pub async fn check_auth(&self, server_id: i64) -> AppResult<bool> {
        let server = self.registry.get(server_id)?;
        self.within_deadline(server_id, self.client.check_auth(&server)).await
    }

    /// Log the server's user in with `password`, storing a ticket.
    pub async fn login(&self, server_id: i64, password: &str) -> AppResult<()> {
        let server = self.registry.get(server_id)?;
        self.within_deadline(server_id, self.client.login(&server, password)).await?;
        tracing::info!("[Coordinator] Ticket stored for {} on {}", server.p4user, server.name);
        Ok(())
    }

    async fn within_deadline<T>(
        &self,
        server_id: i64,
        call: impl std::future::Future<Output = Result<T, EngineError>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.probe.timeout(), call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(EngineError::Timeout {
                target: TargetKey::Server(server_id).to_string(),
                seconds: self.probe.timeout().as_secs(),
            }
            .into()),
        }
    }

    pub fn stats(&self) -> AppResult<EngineStats> {
        let servers = self.registry.list()?;
        let (streams, total_size_bytes, total_files) = self.catalog.totals()?;
        Ok(EngineStats {
            servers: servers.len() as u64,
            active_servers: servers.iter().filter(|s| s.active).count() as u64,
            streams,
            total_size_bytes,
            total_files,
            history_records: self.history.count()?,
        })
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
