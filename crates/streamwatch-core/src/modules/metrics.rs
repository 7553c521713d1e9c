//! Prometheus metrics for the refresh engine.
//!
//! - `streamwatch_measurements_total{outcome}` - Counter of measurements by outcome
//!   (`ok`, `failed`, `timeout`, `blocked`)
//! - `streamwatch_measurement_duration_seconds{outcome}` - Histogram of depot call time
//! - `streamwatch_inflight_keys` - Gauge of held admission keys
//! - `streamwatch_streams_total` - Gauge of live streams in the catalog
//! - `streamwatch_uptime_seconds` - Gauge of process uptime

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use streamwatch_types::EngineError;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

static METRICS_START_TIME: OnceLock<Instant> = OnceLock::new();

/// Depot measurements range from sub-second empty streams to the 45 minute
/// default deadline.
const MEASUREMENT_DURATION_BUCKETS: &[f64] = &[
    0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 2700.0,
];

/// Install the global recorder. Later calls return the same handle.
///
/// Returns `None` when another recorder is already installed; metrics are
/// then dropped and `/metrics` reports that they are unavailable.
pub fn init_metrics() -> Option<PrometheusHandle> {
    let _ = METRICS_START_TIME.get_or_init(Instant::now);
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Some(handle.clone());
    }

    let installed = PrometheusBuilder::new()
        .set_buckets(MEASUREMENT_DURATION_BUCKETS)
        .and_then(PrometheusBuilder::install_recorder);
    let handle = match installed {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!("[Metrics] Prometheus recorder not installed: {}", e);
            return None;
        },
    };
    describe_metrics();
    Some(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

fn describe_metrics() {
    describe_counter!("streamwatch_measurements_total", "Stream measurements by outcome");
    describe_histogram!(
        "streamwatch_measurement_duration_seconds",
        "Time spent measuring one stream, in seconds"
    );
    describe_gauge!("streamwatch_inflight_keys", "Admission keys currently held");
    describe_gauge!("streamwatch_streams_total", "Live streams in the catalog");
    describe_gauge!("streamwatch_uptime_seconds", "Process uptime in seconds");
}

/// Label for a finished measurement.
pub fn outcome_label(error: Option<&EngineError>) -> &'static str {
    match error {
        None => "ok",
        Some(EngineError::Timeout { .. }) => "timeout",
        Some(EngineError::OperationBlocked { .. }) => "blocked",
        Some(_) => "failed",
    }
}

/// Count a measurement that reached the depot.
pub fn record_measurement(outcome: &'static str, elapsed: Duration) {
    let labels = [("outcome", outcome)];
    counter!("streamwatch_measurements_total", &labels).increment(1);
    histogram!("streamwatch_measurement_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

/// Count a measurement refused because its stream was already in flight.
pub fn record_measurement_blocked() {
    counter!("streamwatch_measurements_total", "outcome" => "blocked").increment(1);
}

pub fn update_engine_gauges(inflight_keys: usize, streams: u64) {
    gauge!("streamwatch_inflight_keys").set(inflight_keys as f64);
    gauge!("streamwatch_streams_total").set(streams as f64);
}

fn update_uptime_gauge() {
    if let Some(start) = METRICS_START_TIME.get() {
        gauge!("streamwatch_uptime_seconds").set(start.elapsed().as_secs_f64());
    }
}

/// Render all metrics in Prometheus text format.
pub fn render_metrics() -> String {
    update_uptime_gauge();

    match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::from("# Metrics not initialized\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_label() {
        let timeout = EngineError::Timeout { target: "stream:1".to_string(), seconds: 5 };
        let blocked = EngineError::OperationBlocked { target: "stream:1".to_string() };

        assert_eq!(outcome_label(None), "ok");
        assert_eq!(outcome_label(Some(&timeout)), "timeout");
        assert_eq!(outcome_label(Some(&blocked)), "blocked");
        assert_eq!(outcome_label(Some(&EngineError::stream_not_found(1))), "failed");
    }

    #[test]
    fn test_recorded_series_render() {
        let recorder = PrometheusBuilder::new()
            .set_buckets(MEASUREMENT_DURATION_BUCKETS)
            .unwrap()
            .build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            record_measurement("ok", Duration::from_millis(1500));
            record_measurement("timeout", Duration::from_secs(2700));
            record_measurement_blocked();
            update_engine_gauges(3, 12);
        });

        let text = handle.render();
        assert!(text.contains(r#"streamwatch_measurements_total{outcome="ok"} 1"#), "{text}");
        assert!(text.contains(r#"streamwatch_measurements_total{outcome="timeout"} 1"#));
        assert!(text.contains(r#"streamwatch_measurements_total{outcome="blocked"} 1"#));
        assert!(text.contains("streamwatch_measurement_duration_seconds_bucket"));
        assert!(text.contains("streamwatch_inflight_keys 3"));
        assert!(text.contains("streamwatch_streams_total 12"));
    }
}
