//! Millisecond timestamps as stored in SQLite.

use chrono::{DateTime, Utc};

/// Current time truncated to the millisecond precision the database keeps.
pub fn now_ms() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}
