//! Stream models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stream in the catalog of one server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stream {
    pub id: i64,
    pub server_id: i64,
    /// Depot path, e.g. `//depot/main`
    pub name: String,
    /// Unset until the first successful measurement
    pub size_bytes: Option<u64>,
    /// Unset until the first successful measurement
    pub file_count: Option<u64>,
    /// Time of the last successful measurement
    pub last_updated: Option<DateTime<Utc>>,
    /// Set when the stream vanished upstream; history is kept
    pub deleted: bool,
}

impl Stream {
    /// Cached measurement, if the stream was ever measured.
    pub fn measurement(&self) -> Option<Measurement> {
        match (self.size_bytes, self.file_count) {
            (Some(size_bytes), Some(file_count)) => Some(Measurement { size_bytes, file_count }),
            _ => None,
        }
    }
}

/// Result of one measurement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Measurement {
    pub size_bytes: u64,
    pub file_count: u64,
}

impl Measurement {
    pub const EMPTY: Self = Self { size_bytes: 0, file_count: 0 };

    pub const fn new(size_bytes: u64, file_count: u64) -> Self {
        Self { size_bytes, file_count }
    }
}
