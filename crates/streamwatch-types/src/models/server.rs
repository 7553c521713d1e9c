//! Depot server models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Perforce server known to the registry.
///
/// Servers are identified across config reloads by `p4port`. A server that
/// disappears from the config is deactivated, never deleted, so its streams
/// and history survive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Server {
    /// Local identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Server address (`host:port`, `ssl:host:port`)
    pub p4port: String,
    /// User the measurements run as; tickets come from the shared tickets file
    pub p4user: String,
    /// Name filter passed to `p4 streams -F Name=<mask>`
    pub stream_mask: String,
    /// False once the server was dropped from configuration
    pub active: bool,
    /// Declaration order in the configuration file
    pub position: i64,
    pub created_at: DateTime<Utc>,
    /// Last successful stream sync
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Server plus aggregates over its live streams.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerOverview {
    #[serde(flatten)]
    pub server: Server,
    pub stream_count: u64,
    pub total_size_bytes: u64,
    pub total_files: u64,
}
