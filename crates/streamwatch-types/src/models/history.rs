//! History time series models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable measurement of a stream at an instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRecord {
    pub stream_id: i64,
    /// Millisecond precision; unique per stream
    pub recorded_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub file_count: u64,
}
