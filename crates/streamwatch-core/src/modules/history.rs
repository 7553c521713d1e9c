//! Append-only stream size history.
#![allow(clippy::cast_possible_wrap, reason = "day counts are clamped by config")]

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Row};

use streamwatch_types::{EngineError, HistoryRecord, Measurement};

use super::catalog::write_measurement;
use super::database::Database;
use crate::error::{AppError, AppResult};
use crate::utils::time::{from_millis, now_ms};

#[derive(Clone)]
pub struct HistoryStore {
    db: Database,
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    Ok(HistoryRecord {
        stream_id: row.get(0)?,
        recorded_at: from_millis(row.get(1)?),
        size_bytes: row.get(2)?,
        file_count: row.get(3)?,
    })
}

impl HistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append one record. Fails with `DuplicateTimestamp` when the stream
    /// already has a record at that millisecond.
    pub fn append(
        &self,
        stream_id: i64,
        recorded_at: DateTime<Utc>,
        measurement: Measurement,
    ) -> AppResult<HistoryRecord> {
        self.db.with_tx(|tx| insert_record(tx, stream_id, recorded_at, measurement))
    }

    /// Store a fresh measurement of a stream.
    ///
    /// The cached size on the stream row and, when `append` is set, a history
    /// record are written in one transaction: either both land or neither.
    /// Returns the appended record, or `None` when none was written. A record
    /// already stored at the same millisecond is kept and the new one dropped.
    pub fn record(
        &self,
        stream_id: i64,
        recorded_at: DateTime<Utc>,
        measurement: Measurement,
        append: bool,
    ) -> AppResult<Option<HistoryRecord>> {
        self.db.with_tx(|tx| {
            write_measurement(tx, stream_id, measurement, recorded_at)?;
            if !append {
                return Ok(None);
            }
            match insert_record(tx, stream_id, recorded_at, measurement) {
                Ok(record) => Ok(Some(record)),
                Err(AppError::Engine(e @ EngineError::DuplicateTimestamp { .. })) => {
                    tracing::error!("[History] Dropping history write: {}", e);
                    Ok(None)
                },
                Err(e) => Err(e),
            }
        })
    }

    /// Records from the last `since_days` days, oldest first.
    pub fn query(&self, stream_id: i64, since_days: u32) -> AppResult<Vec<HistoryRecord>> {
        let cutoff = cutoff_ms(since_days);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT stream_id, recorded_at, size_bytes, file_count
                 FROM stream_history
                 WHERE stream_id = ?1 AND recorded_at >= ?2
                 ORDER BY recorded_at ASC",
            )?;
            let rows = stmt.query_map(params![stream_id, cutoff], map_record)?;
            rows.collect()
        })
    }

    /// Like `query`, keeping only the `limit` most recent records.
    pub fn query_recent(
        &self,
        stream_id: i64,
        since_days: u32,
        limit: usize,
    ) -> AppResult<Vec<HistoryRecord>> {
        let cutoff = cutoff_ms(since_days);
        let mut records = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT stream_id, recorded_at, size_bytes, file_count
                 FROM stream_history
                 WHERE stream_id = ?1 AND recorded_at >= ?2
                 ORDER BY recorded_at DESC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![stream_id, cutoff, limit as i64], map_record)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;
        records.reverse();
        Ok(records)
    }

    /// Delete records older than `retention_days`. Returns rows removed.
    pub fn prune(&self, retention_days: u32) -> AppResult<usize> {
        let cutoff = cutoff_ms(retention_days);
        let removed = self.db.with_conn(|conn| {
            conn.execute("DELETE FROM stream_history WHERE recorded_at < ?1", params![cutoff])
        })?;
        if removed > 0 {
            tracing::info!("[History] Pruned {} records older than {} days", removed, retention_days);
        }
        Ok(removed)
    }

    pub fn count(&self) -> AppResult<u64> {
        self.db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM stream_history", [], |row| row.get(0))
        })
    }
}

fn insert_record(
    conn: &Connection,
    stream_id: i64,
    recorded_at: DateTime<Utc>,
    measurement: Measurement,
) -> AppResult<HistoryRecord> {
    let timestamp = recorded_at.timestamp_millis();
    let inserted = conn.execute(
        "INSERT INTO stream_history (stream_id, recorded_at, size_bytes, file_count)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (stream_id, recorded_at) DO NOTHING",
        params![stream_id, timestamp, measurement.size_bytes, measurement.file_count],
    )?;
    if inserted == 0 {
        return Err(EngineError::DuplicateTimestamp { stream_id, timestamp }.into());
    }
    Ok(HistoryRecord {
        stream_id,
        recorded_at: from_millis(timestamp),
        size_bytes: measurement.size_bytes,
        file_count: measurement.file_count,
    })
}

/// Epoch millis `days` ago; saturates at the earliest instant for huge spans.
fn cutoff_ms(days: u32) -> i64 {
    Duration::try_days(i64::from(days))
        .and_then(|span| now_ms().checked_sub_signed(span))
        .map_or(i64::MIN, |cutoff| cutoff.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::seed_stream;

    fn store() -> (HistoryStore, i64) {
        let db = Database::open_in_memory().unwrap();
        let stream_id = seed_stream(&db, "ssl:p4:1666", "//depot/main");
        (HistoryStore::new(db), stream_id)
    }

    fn cached_size(history: &HistoryStore, stream_id: i64) -> Option<u64> {
        history
            .db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT size_bytes FROM streams WHERE id = ?1",
                    params![stream_id],
                    |row| row.get(0),
                )
            })
            .unwrap()
    }

    #[test]
    fn test_duplicate_timestamp_keeps_first() {
        let (history, stream_id) = store();
        let at = now_ms();

        assert!(history.record(stream_id, at, Measurement::new(100, 1), true).unwrap().is_some());
        assert!(history.record(stream_id, at, Measurement::new(999, 9), true).unwrap().is_none());
        // The cache still follows the newest measurement.
        assert_eq!(cached_size(&history, stream_id), Some(999));

        let records = history.query(stream_id, 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].size_bytes, 100);
        assert_eq!(records[0].file_count, 1);
    }

    #[test]
    fn test_append_rejects_duplicate_timestamp() {
        let (history, stream_id) = store();
        let at = now_ms();

        let first = history.append(stream_id, at, Measurement::new(100, 1)).unwrap();
        assert_eq!(first.size_bytes, 100);

        let err = history.append(stream_id, at, Measurement::new(999, 9)).unwrap_err();
        assert!(matches!(
            err,
            AppError::Engine(EngineError::DuplicateTimestamp { stream_id: id, .. }) if id == stream_id
        ));
        assert_eq!(history.query(stream_id, 1).unwrap(), vec![first]);
        // Appending never touches the cached size.
        assert_eq!(cached_size(&history, stream_id), None);
    }

    #[test]
    fn test_query_filters_by_days_and_sorts() {
        let (history, stream_id) = store();
        let now = now_ms();

        history.record(stream_id, now - Duration::days(3), Measurement::new(3, 3), true).unwrap();
        history.record(stream_id, now - Duration::days(10), Measurement::new(10, 10), true).unwrap();
        history.record(stream_id, now - Duration::days(1), Measurement::new(1, 1), true).unwrap();

        let week = history.query(stream_id, 7).unwrap();
        let sizes: Vec<u64> = week.iter().map(|r| r.size_bytes).collect();
        assert_eq!(sizes, vec![3, 1]);

        let all = history.query(stream_id, 30).unwrap();
        assert!(all.windows(2).all(|w| w[0].recorded_at < w[1].recorded_at));
    }

    #[test]
    fn test_empty_range_is_empty() {
        let (history, stream_id) = store();
        assert!(history.query(stream_id, 7).unwrap().is_empty());
        assert!(history.query_recent(stream_id, 7, 10).unwrap().is_empty());
    }

    #[test]
    fn test_query_recent_keeps_newest_ascending() {
        let (history, stream_id) = store();
        let now = now_ms();
        for day in 1..=5_i64 {
            history.record(stream_id, now - Duration::days(day), Measurement::new(day as u64, 1), true).unwrap();
        }

        let recent = history.query_recent(stream_id, 30, 2).unwrap();
        let sizes: Vec<u64> = recent.iter().map(|r| r.size_bytes).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_prune_removes_old_records() {
        let (history, stream_id) = store();
        let now = now_ms();
        history.record(stream_id, now - Duration::days(400), Measurement::new(1, 1), true).unwrap();
        history.record(stream_id, now, Measurement::new(2, 1), true).unwrap();

        assert_eq!(history.prune(365).unwrap(), 1);
        assert_eq!(history.count().unwrap(), 1);
        assert_eq!(history.query(stream_id, 1).unwrap()[0].size_bytes, 2);
    }

    #[test]
    fn test_huge_day_counts_saturate() {
        let (history, stream_id) = store();
        let now = now_ms();
        history.record(stream_id, now - Duration::days(4000), Measurement::new(1, 1), true).unwrap();
        history.record(stream_id, now, Measurement::new(2, 1), true).unwrap();

        assert_eq!(history.query(stream_id, u32::MAX).unwrap().len(), 2);
        assert_eq!(history.query_recent(stream_id, u32::MAX, 1).unwrap().len(), 1);
        assert_eq!(history.prune(u32::MAX).unwrap(), 0);
        assert_eq!(history.count().unwrap(), 2);
    }

    #[test]
    fn test_failed_history_write_leaves_cache_untouched() {
        let (history, stream_id) = store();
        history.record(stream_id, now_ms(), Measurement::new(100, 1), true).unwrap();
        history
            .db
            .with_conn(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_history BEFORE INSERT ON stream_history
                     BEGIN SELECT RAISE(ABORT, 'history unavailable'); END;",
                )
            })
            .unwrap();

        let err = history
            .record(stream_id, now_ms() + Duration::seconds(1), Measurement::new(999, 9), true)
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(cached_size(&history, stream_id), Some(100));
        assert_eq!(history.count().unwrap(), 1);

        // Without a history record only the cache is written.
        assert!(history
            .record(stream_id, now_ms() + Duration::seconds(2), Measurement::new(5, 1), false)
            .unwrap()
            .is_none());
        assert_eq!(cached_size(&history, stream_id), Some(5));
    }
}
