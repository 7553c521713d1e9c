//! Refresh and sync outcomes, engine statistics.

use serde::{Deserialize, Serialize};

/// Aggregate outcome of a server-wide or global refresh.
///
/// `added` and `removed` stay zero for refreshes; they only move when a
/// stream sync runs as part of the same batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RefreshStats {
    pub added: usize,
    /// Streams whose measurement succeeded
    pub updated: usize,
    pub removed: usize,
    /// Streams whose measurement failed
    pub failed: usize,
    /// Streams skipped because another operation held them
    pub skipped: usize,
}

impl RefreshStats {
    pub fn merge(&mut self, other: &Self) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }

    /// Number of streams the batch attempted.
    pub const fn total(&self) -> usize {
        self.updated + self.failed + self.skipped
    }
}

/// Outcome of reconciling one server's catalog with the live stream list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StreamSyncStats {
    pub added: usize,
    pub removed: usize,
    /// Live streams after the sync
    pub total: usize,
}

/// Outcome of reconciling the registry with the configuration file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ServerSyncStats {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Servers dropped from config and marked inactive
    pub deactivated: usize,
}

impl ServerSyncStats {
    pub const fn has_changes(&self) -> bool {
        self.added > 0 || self.updated > 0 || self.deactivated > 0
    }

    pub fn message(&self) -> String {
        if self.has_changes() {
            format!(
                "Servers synchronized: +{} ~{} -{}",
                self.added, self.updated, self.deactivated
            )
        } else {
            "Servers already synchronized".to_string()
        }
    }
}

/// Totals for the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub servers: u64,
    pub active_servers: u64,
    pub streams: u64,
    pub total_size_bytes: u64,
    pub total_files: u64,
    pub history_records: u64,
}

/// One held admission key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InFlightEntry {
    /// Target key, e.g. `stream:12`
    pub key: String,
    pub age_secs: u64,
}
