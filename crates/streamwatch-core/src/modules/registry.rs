//! Known depot servers, reconciled against the configuration file.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;

use streamwatch_types::models::{validate_server_entries, ServerOverview, ServerSyncStats};
use streamwatch_types::{EngineError, Server, ServerEntry};

use super::database::Database;
use crate::error::AppResult;
use crate::utils::time::{from_millis, now_ms};

const SERVER_COLUMNS: &str =
    "id, name, p4port, p4user, stream_mask, active, position, created_at, last_synced_at";

#[derive(Clone)]
pub struct ServerRegistry {
    db: Database,
}

fn map_server(row: &Row<'_>) -> rusqlite::Result<Server> {
    Ok(Server {
        id: row.get(0)?,
        name: row.get(1)?,
        p4port: row.get(2)?,
        p4user: row.get(3)?,
        stream_mask: row.get(4)?,
        active: row.get(5)?,
        position: row.get(6)?,
        created_at: from_millis(row.get(7)?),
        last_synced_at: row.get::<_, Option<i64>>(8)?.map(from_millis),
    })
}

impl ServerRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All servers in configuration order, inactive ones last.
    pub fn list(&self) -> AppResult<Vec<Server>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SERVER_COLUMNS} FROM servers ORDER BY active DESC, position ASC, id ASC"
            ))?;
            let rows = stmt.query_map([], map_server)?;
            rows.collect()
        })
    }

    pub fn list_active(&self) -> AppResult<Vec<Server>> {
        Ok(self.list()?.into_iter().filter(|s| s.active).collect())
    }

    pub fn get(&self, id: i64) -> AppResult<Server> {
        let server = self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SERVER_COLUMNS} FROM servers WHERE id = ?1"),
                params![id],
                map_server,
            )
            .optional()
        })?;
        server.ok_or_else(|| EngineError::server_not_found(id).into())
    }

    /// Servers with live stream count and summed size.
    pub fn overview(&self) -> AppResult<Vec<ServerOverview>> {
        let totals: HashMap<i64, (u64, u64, u64)> = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT server_id, COUNT(*), COALESCE(SUM(size_bytes), 0), COALESCE(SUM(file_count), 0)
                 FROM streams WHERE deleted = 0 GROUP BY server_id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, (row.get(1)?, row.get(2)?, row.get(3)?)))
            })?;
            rows.collect()
        })?;

        Ok(self
            .list()?
            .into_iter()
            .map(|server| {
                let (stream_count, total_size_bytes, total_files) =
                    totals.get(&server.id).copied().unwrap_or_default();
                ServerOverview { server, stream_count, total_size_bytes, total_files }
            })
            .collect())
    }

    /// Reconcile with the configured servers, keyed by `p4port`.
    ///
    /// New entries are inserted, changed ones updated, and servers missing
    /// from the config are deactivated (never deleted). The batch is
    /// validated up front and applied in one transaction.
    pub fn sync_from_config(&self, entries: &[ServerEntry]) -> AppResult<ServerSyncStats> {
        validate_server_entries(entries)?;

        let existing: HashMap<String, Server> =
            self.list()?.into_iter().map(|s| (s.p4port.clone(), s)).collect();
        let now = now_ms().timestamp_millis();

        let stats = self.db.with_tx(|tx| {
            let mut stats = ServerSyncStats::default();

            for (position, entry) in entries.iter().enumerate() {
                let position = position as i64;
                match existing.get(&entry.p4port) {
                    Some(server) if is_unchanged(server, entry, position) => {
                        stats.unchanged += 1;
                    },
                    Some(server) => {
                        tx.execute(
                            "UPDATE servers
                             SET name = ?1, p4user = ?2, stream_mask = ?3, position = ?4, active = 1
                             WHERE id = ?5",
                            params![entry.name, entry.p4user, entry.stream_mask, position, server.id],
                        )?;
                        tracing::debug!("[Registry] Updated server {} ({})", entry.name, entry.p4port);
                        stats.updated += 1;
                    },
                    None => {
                        tx.execute(
                            "INSERT INTO servers (name, p4port, p4user, stream_mask, active, position, created_at)
                             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
                            params![entry.name, entry.p4port, entry.p4user, entry.stream_mask, position, now],
                        )?;
                        tracing::info!("[Registry] Added server {} ({})", entry.name, entry.p4port);
                        stats.added += 1;
                    },
                }
            }

            for server in existing.values() {
                if server.active && !entries.iter().any(|e| e.p4port == server.p4port) {
                    tx.execute("UPDATE servers SET active = 0 WHERE id = ?1", params![server.id])?;
                    tracing::warn!(
                        "[Registry] Deactivated server {} ({}): no longer configured",
                        server.name,
                        server.p4port
                    );
                    stats.deactivated += 1;
                }
            }

            Ok(stats)
        })?;

        tracing::info!("[Registry] {}", stats.message());
        Ok(stats)
    }

    pub fn mark_synced(&self, id: i64, at: DateTime<Utc>) -> AppResult<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE servers SET last_synced_at = ?1 WHERE id = ?2",
                params![at.timestamp_millis(), id],
            )
        })?;
        Ok(())
    }
}

fn is_unchanged(server: &Server, entry: &ServerEntry, position: i64) -> bool {
    server.active
        && server.name == entry.name
        && server.p4user == entry.p4user
        && server.stream_mask == entry.stream_mask
        && server.position == position
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamwatch_types::ConfigError;

    use crate::error::AppError;

    fn entry(name: &str, port: &str) -> ServerEntry {
        ServerEntry {
            name: name.to_string(),
            p4port: port.to_string(),
            p4user: "ci".to_string(),
            stream_mask: "*role*".to_string(),
            password: None,
        }
    }

    fn registry() -> ServerRegistry {
        ServerRegistry::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_sync_adds_in_declaration_order() {
        let registry = registry();
        let stats = registry
            .sync_from_config(&[entry("zeta", "p4:2"), entry("alpha", "p4:1")])
            .unwrap();

        assert_eq!(stats.added, 2);
        let names: Vec<String> = registry.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["zeta".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn test_resync_counts_updates_and_unchanged() {
        let registry = registry();
        registry.sync_from_config(&[entry("a", "p4:1"), entry("b", "p4:2")]).unwrap();

        let stats = registry
            .sync_from_config(&[entry("a", "p4:1"), entry("b-renamed", "p4:2")])
            .unwrap();
        assert_eq!(stats, ServerSyncStats { added: 0, updated: 1, unchanged: 1, deactivated: 0 });

        let again = registry
            .sync_from_config(&[entry("a", "p4:1"), entry("b-renamed", "p4:2")])
            .unwrap();
        assert!(!again.has_changes());
    }

    #[test]
    fn test_removed_server_is_deactivated_not_deleted() {
        let registry = registry();
        registry.sync_from_config(&[entry("a", "p4:1"), entry("b", "p4:2")]).unwrap();

        let stats = registry.sync_from_config(&[entry("a", "p4:1")]).unwrap();
        assert_eq!(stats.deactivated, 1);

        let all = registry.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(registry.list_active().unwrap().len(), 1);

        let back = registry.sync_from_config(&[entry("a", "p4:1"), entry("b", "p4:2")]).unwrap();
        assert_eq!(back.updated, 1);
        assert_eq!(registry.list_active().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_batch_is_rejected_atomically() {
        let registry = registry();
        registry.sync_from_config(&[entry("a", "p4:1")]).unwrap();

        let err = registry
            .sync_from_config(&[entry("new", "p4:9"), entry("", "p4:10")])
            .unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::ValidationError { .. })));

        let ports: Vec<String> = registry.list().unwrap().into_iter().map(|s| s.p4port).collect();
        assert_eq!(ports, vec!["p4:1".to_string()]);
    }

    #[test]
    fn test_get_missing_server() {
        let err = registry().get(77).unwrap_err();
        assert_eq!(err.engine(), Some(&EngineError::server_not_found(77)));
    }
}
