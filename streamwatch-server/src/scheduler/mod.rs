//! Background Schedulers
//!
//! ## Mass Update Scheduler
//! Periodically refreshes every stream of every active server.
//!
//! Features:
//! - Interval from `scheduler.update_interval_hours` (0 disables it)
//! - First run one full interval after startup
//! - Optional catalog sync per server before measuring (`scheduler.sync_streams`)
//! - A run that finds another global refresh in flight is skipped, not queued
//! - History older than `history.retention_days` is pruned after each run

use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use streamwatch_types::RefreshStats;

use crate::state::AppState;

const SECS_PER_HOUR: u64 = 60 * 60;

/// Start the mass update scheduler as a background tokio task
pub fn start_mass_update(state: AppState) {
    tokio::spawn(async move {
        let config = state.scheduler_config().await;
        if config.update_interval_hours == 0 {
            tracing::info!("[Scheduler] Automatic updates disabled");
            return;
        }

        let period = Duration::from_secs(config.update_interval_hours * SECS_PER_HOUR);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            "[Scheduler] Mass update every {}h (stream sync: {})",
            config.update_interval_hours,
            config.sync_streams
        );

        loop {
            ticker.tick().await;
            run_mass_update(&state).await;
        }
    });
}

/// One scheduled run. Returns `None` when the run was skipped or failed.
pub async fn run_mass_update(state: &AppState) -> Option<RefreshStats> {
    let config = state.scheduler_config().await;
    tracing::info!("[Scheduler] Starting scheduled update of all streams");

    let result = match state.coordinator().mass_update(config.sync_streams).await {
        Ok(stats) => {
            tracing::info!(
                "[Scheduler] Scheduled update done: {} updated, {} failed, {} skipped",
                stats.updated,
                stats.failed,
                stats.skipped
            );
            Some(stats)
        },
        Err(e) if e.is_blocked() => {
            tracing::warn!("[Scheduler] Scheduled update skipped: {}", e);
            None
        },
        Err(e) => {
            tracing::error!("[Scheduler] Scheduled update failed: {}", e);
            None
        },
    };

    if let Some(days) = state.history_config().await.retention_days {
        if let Err(e) = state.coordinator().history().prune(days) {
            tracing::warn!("[Scheduler] History pruning failed: {}", e);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{test_app_state, FakeDepot};
    use streamwatch_core::TargetKey;

    #[tokio::test]
    async fn test_run_syncs_and_refreshes() {
        let depot = FakeDepot::with_streams(&["//depot/main", "//depot/rel1"]);
        let (state, _tmp) = test_app_state(depot).await;

        let stats = run_mass_update(&state).await.unwrap();
        assert_eq!(stats.added, 2);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_blocked_run_is_skipped() {
        let (state, _tmp) = test_app_state(FakeDepot::with_streams(&["//depot/main"])).await;
        let held = state.coordinator().inflight().try_acquire(TargetKey::All).unwrap();

        assert!(run_mass_update(&state).await.is_none());
        assert_eq!(state.coordinator().history().count().unwrap(), 0);
        drop(held);
    }
}
