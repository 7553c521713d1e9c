//! Per-server stream catalog.
//!
//! Reads are served from the database. `sync_streams` is the only operation
//! that contacts the depot: it diffs the live stream list against the cached
//! one by name. Vanished streams are flagged `deleted` so their history stays
//! queryable; a stream that comes back is revived with its old id.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use streamwatch_types::models::StreamSyncStats;
use streamwatch_types::{EngineError, Measurement, Stream};

use super::database::Database;
use super::inflight::{InFlightSet, TargetKey};
use super::registry::ServerRegistry;
use crate::depot::DepotClient;
use crate::error::AppResult;
use crate::utils::time::{from_millis, now_ms};

const STREAM_COLUMNS: &str =
    "id, server_id, name, size_bytes, file_count, last_updated, deleted";

#[derive(Clone)]
pub struct StreamCatalog {
    db: Database,
    registry: ServerRegistry,
    client: Arc<dyn DepotClient>,
    inflight: InFlightSet,
    timeout: Duration,
}

fn map_stream(row: &Row<'_>) -> rusqlite::Result<Stream> {
    Ok(Stream {
        id: row.get(0)?,
        server_id: row.get(1)?,
        name: row.get(2)?,
        size_bytes: row.get(3)?,
        file_count: row.get(4)?,
        last_updated: row.get::<_, Option<i64>>(5)?.map(from_millis),
        deleted: row.get(6)?,
    })
}

impl StreamCatalog {
    pub fn new(
        db: Database,
        registry: ServerRegistry,
        client: Arc<dyn DepotClient>,
        inflight: InFlightSet,
        timeout: Duration,
    ) -> Self {
        Self { db, registry, client, inflight, timeout }
    }

    /// Cached live streams of a server, by name. Does not contact the depot.
    pub fn list_streams(&self, server_id: i64) -> AppResult<Vec<Stream>> {
        self.registry.get(server_id)?;
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STREAM_COLUMNS} FROM streams
                 WHERE server_id = ?1 AND deleted = 0 ORDER BY name ASC"
            ))?;
            let rows = stmt.query_map(params![server_id], map_stream)?;
            rows.collect()
        })
    }

    /// A stream by id, including deleted ones.
    pub fn get_stream(&self, stream_id: i64) -> AppResult<Stream> {
        let stream = self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {STREAM_COLUMNS} FROM streams WHERE id = ?1"),
                params![stream_id],
                map_stream,
            )
            .optional()
        })?;
        stream.ok_or_else(|| EngineError::stream_not_found(stream_id).into())
    }

    /// Page through live streams, optionally for one server.
    /// Returns the page and the total number of matching streams.
    pub fn page(
        &self,
        server_id: Option<i64>,
        page: usize,
        per_page: usize,
    ) -> AppResult<(Vec<Stream>, u64)> {
        // A page past anything SQLite can address is simply empty.
        let offset =
            page.saturating_sub(1).checked_mul(per_page).and_then(|o| i64::try_from(o).ok());
        let limit = i64::try_from(per_page).unwrap_or(i64::MAX);
        self.db.with_conn(|conn| {
            let total: u64 = conn.query_row(
                "SELECT COUNT(*) FROM streams
                 WHERE deleted = 0 AND (?1 IS NULL OR server_id = ?1)",
                params![server_id],
                |row| row.get(0),
            )?;
            let Some(offset) = offset else {
                return Ok((Vec::new(), total));
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {STREAM_COLUMNS} FROM streams
                 WHERE deleted = 0 AND (?1 IS NULL OR server_id = ?1)
                 ORDER BY server_id ASC, name ASC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows =
                stmt.query_map(params![server_id, limit, offset], map_stream)?;
            Ok((rows.collect::<rusqlite::Result<Vec<_>>>()?, total))
        })
    }

    /// Case-insensitive substring search over live stream names.
    pub fn search(&self, query: &str, limit: usize) -> AppResult<Vec<Stream>> {
        let pattern = format!("%{}%", escape_like(query));
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {STREAM_COLUMNS} FROM streams
                 WHERE deleted = 0 AND name LIKE ?1 ESCAPE '\\'
                 ORDER BY name ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![pattern, limit as i64], map_stream)?;
            rows.collect()
        })
    }

    /// Number of live streams and their summed size and file count.
    pub fn totals(&self) -> AppResult<(u64, u64, u64)> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), COALESCE(SUM(file_count), 0)
                 FROM streams WHERE deleted = 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
        })
    }

    /// Stream names on the depot right now.
    pub async fn fetch_live_streams(&self, server_id: i64) -> AppResult<Vec<String>> {
        let server = self.registry.get(server_id)?;
        let listing = tokio::time::timeout(self.timeout, self.client.list_streams(&server)).await;
        match listing {
            Ok(result) => Ok(result?),
            Err(_) => Err(EngineError::Timeout {
                target: TargetKey::Sync(server_id).to_string(),
                seconds: self.timeout.as_secs(),
            }
            .into()),
        }
    }

    /// Reconcile the cached stream set with the depot.
    pub async fn sync_streams(&self, server_id: i64) -> AppResult<StreamSyncStats> {
        let _guard = self.inflight.try_acquire(TargetKey::Sync(server_id))?;

        let live = self.fetch_live_streams(server_id).await?;
        let stats = self.apply_live_streams(server_id, &live)?;
        self.registry.mark_synced(server_id, now_ms())?;

        tracing::info!(
            "[Catalog] Server {}: +{} -{} ({} streams)",
            server_id,
            stats.added,
            stats.removed,
            stats.total
        );
        Ok(stats)
    }

    fn apply_live_streams(&self, server_id: i64, live: &[String]) -> AppResult<StreamSyncStats> {
        let live: HashSet<&str> = live.iter().map(String::as_str).collect();

        self.db.with_tx(|tx| {
            let known: HashMap<String, (i64, bool)> = {
                let mut stmt =
                    tx.prepare("SELECT name, id, deleted FROM streams WHERE server_id = ?1")?;
                let rows = stmt.query_map(params![server_id], |row| {
                    Ok((row.get::<_, String>(0)?, (row.get(1)?, row.get(2)?)))
                })?;
                rows.collect::<rusqlite::Result<_>>()?
            };

            let mut stats = StreamSyncStats { total: live.len(), ..Default::default() };

            let mut new_names: Vec<&str> = live.iter().copied().collect();
            new_names.sort_unstable();
            for name in new_names {
                match known.get(name) {
                    Some((_, false)) => {},
                    Some((id, true)) => {
                        tx.execute("UPDATE streams SET deleted = 0 WHERE id = ?1", params![id])?;
                        stats.added += 1;
                    },
                    None => {
                        tx.execute(
                            "INSERT INTO streams (server_id, name) VALUES (?1, ?2)",
                            params![server_id, name],
                        )?;
                        tracing::debug!("[Catalog] New stream {} on server {}", name, server_id);
                        stats.added += 1;
                    },
                }
            }

            for (name, (id, deleted)) in &known {
                if !deleted && !live.contains(name.as_str()) {
                    tx.execute("UPDATE streams SET deleted = 1 WHERE id = ?1", params![id])?;
                    tracing::debug!("[Catalog] Stream {} gone from server {}", name, server_id);
                    stats.removed += 1;
                }
            }

            Ok(stats)
        })
    }
}

/// Store a measurement as the stream's current size, inside the caller's
/// transaction.
pub(crate) fn write_measurement(
    conn: &Connection,
    stream_id: i64,
    measurement: Measurement,
    at: DateTime<Utc>,
) -> AppResult<()> {
    let updated = conn.execute(
        "UPDATE streams SET size_bytes = ?1, file_count = ?2, last_updated = ?3 WHERE id = ?4",
        params![measurement.size_bytes, measurement.file_count, at.timestamp_millis(), stream_id],
    )?;
    if updated == 0 {
        return Err(EngineError::stream_not_found(stream_id).into());
    }
    Ok(())
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
