//! Application configuration, loaded from a YAML file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use validator::Validate;

use crate::error::ConfigError;

pub const DEFAULT_STREAM_MASK: &str = "*role*";

/// Upper bound for every day-count setting, roughly a century.
pub const MAX_HISTORY_DAYS: u32 = 36_500;

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default, Validate)]
pub struct AppConfig {
    /// Servers to monitor, in display order
    #[serde(default)]
    #[validate(nested)]
    pub servers: Vec<ServerEntry>,
    #[serde(default)]
    #[validate(nested)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    #[validate(nested)]
    pub history: HistoryConfig,
    #[serde(default)]
    #[validate(nested)]
    pub inflight: InFlightConfig,
    #[serde(default)]
    #[validate(nested)]
    pub http: HttpConfig,
}

impl AppConfig {
    /// Validate every section and reject duplicate server addresses.
    ///
    /// The whole config is rejected on the first problem; callers apply it
    /// only after this returns `Ok`.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate().map_err(|e| ConfigError::ValidationError {
            field: "config".to_string(),
            message: e.to_string(),
        })?;
        if self.inflight.stale_after_secs <= self.probe.timeout_secs {
            return Err(ConfigError::ValidationError {
                field: "inflight.stale_after_secs".to_string(),
                message: format!(
                    "must exceed probe.timeout_secs ({}), got {}",
                    self.probe.timeout_secs, self.inflight.stale_after_secs
                ),
            });
        }
        validate_server_entries(&self.servers)
    }
}

/// Validate server declarations as one unit.
pub fn validate_server_entries(entries: &[ServerEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        entry.validate().map_err(|e| ConfigError::ValidationError {
            field: format!("servers[{index}]"),
            message: e.to_string(),
        })?;
        if !seen.insert(entry.p4port.as_str()) {
            return Err(ConfigError::ValidationError {
                field: format!("servers[{index}].p4port"),
                message: format!("duplicate server address {}", entry.p4port),
            });
        }
    }
    Ok(())
}

/// One server declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ServerEntry {
    #[validate(length(min = 1_u64))]
    pub name: String,
    #[validate(length(min = 1_u64))]
    pub p4port: String,
    #[validate(length(min = 1_u64))]
    pub p4user: String,
    #[serde(default = "default_stream_mask")]
    #[validate(length(min = 1_u64))]
    pub stream_mask: String,
    /// Used only by `login`; never written back or exposed over the API
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

/// Depot client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ProbeConfig {
    /// Deadline for a single depot call, in seconds
    #[serde(default = "default_probe_timeout")]
    #[validate(range(min = 1_u64))]
    pub timeout_secs: u64,
    /// Path or name of the `p4` executable
    #[serde(default = "default_p4_binary")]
    #[validate(length(min = 1_u64))]
    pub p4_binary: String,
    /// Tickets file; defaults to `<data_dir>/.p4tickets`
    #[serde(default)]
    pub tickets_file: Option<PathBuf>,
    /// Root directory for temporary clients; defaults to `<data_dir>/clients`
    #[serde(default)]
    pub client_root: Option<PathBuf>,
    /// Measurements running at once inside a server refresh
    #[serde(default = "default_max_parallel")]
    #[validate(range(min = 1_usize, max = 64_usize))]
    pub max_parallel: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
            p4_binary: default_p4_binary(),
            tickets_file: None,
            client_root: None,
            max_parallel: default_max_parallel(),
        }
    }
}

/// Periodic mass update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Hours between runs; 0 disables the scheduler
    #[serde(default = "default_update_interval_hours")]
    pub update_interval_hours: u64,
    /// Reconcile each server's catalog before measuring
    #[serde(default = "default_true")]
    pub sync_streams: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { update_interval_hours: default_update_interval_hours(), sync_streams: true }
    }
}

/// History recording and query limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct HistoryConfig {
    /// Records older than this are pruned by the scheduler; `None` keeps all
    #[serde(default)]
    #[validate(range(min = 1_u32, max = MAX_HISTORY_DAYS))]
    pub retention_days: Option<u32>,
    #[serde(default = "default_history_days")]
    #[validate(range(min = 1_u32, max = MAX_HISTORY_DAYS))]
    pub default_days: u32,
    #[serde(default = "default_max_history_days")]
    #[validate(range(min = 1_u32, max = MAX_HISTORY_DAYS))]
    pub max_days: u32,
    #[serde(default = "default_history_limit")]
    #[validate(range(min = 1_usize))]
    pub default_limit: usize,
    #[serde(default = "default_max_history_limit")]
    #[validate(range(min = 1_usize))]
    pub max_limit: usize,
    /// Skip the history write when size and file count did not change
    #[serde(default)]
    pub skip_unchanged: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: None,
            default_days: default_history_days(),
            max_days: default_max_history_days(),
            default_limit: default_history_limit(),
            max_limit: default_max_history_limit(),
            skip_unchanged: false,
        }
    }
}

impl HistoryConfig {
    pub fn clamp_days(&self, days: Option<u32>) -> u32 {
        days.unwrap_or(self.default_days).clamp(1, self.max_days.max(1))
    }

    pub fn clamp_limit(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.default_limit).clamp(1, self.max_limit.max(1))
    }
}

/// Admission guard settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct InFlightConfig {
    /// Single-stream and catalog entries older than this are treated as
    /// abandoned and can be reclaimed; must exceed `probe.timeout_secs`
    #[serde(default = "default_stale_after")]
    #[validate(range(min = 1_u64))]
    pub stale_after_secs: u64,
}

impl Default for InFlightConfig {
    fn default() -> Self {
        Self { stale_after_secs: default_stale_after() }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct HttpConfig {
    /// Interface address to listen on; `127.0.0.1` keeps the API local
    #[serde(default = "default_bind_address")]
    #[validate(ip)]
    pub bind_address: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address() }
    }
}

impl HttpConfig {
    /// Full listen address for `port`.
    pub fn socket_addr(&self, port: u16) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind_address.parse().map_err(|_| ConfigError::ValidationError {
            field: "http.bind_address".to_string(),
            message: format!("not an IP address: {}", self.bind_address),
        })?;
        Ok(SocketAddr::new(ip, port))
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_stream_mask() -> String {
    DEFAULT_STREAM_MASK.to_string()
}

fn default_probe_timeout() -> u64 {
    45 * 60
}

fn default_p4_binary() -> String {
    "p4".to_string()
}

fn default_max_parallel() -> usize {
    4
}

fn default_update_interval_hours() -> u64 {
    24
}

fn default_true() -> bool {
    true
}

fn default_history_days() -> u32 {
    30
}

fn default_max_history_days() -> u32 {
    365
}

fn default_history_limit() -> usize {
    100
}

fn default_max_history_limit() -> usize {
    1000
}

fn default_stale_after() -> u64 {
    3 * 60 * 60
}
