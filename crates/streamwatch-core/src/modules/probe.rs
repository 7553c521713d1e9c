//! One deadline-bounded size measurement.

use std::sync::Arc;
use std::time::Duration;

use streamwatch_types::{EngineError, Measurement, Server, Stream};

use super::inflight::TargetKey;
use super::metrics;
use crate::depot::DepotClient;

/// Measures a stream through the depot client. Never writes anything;
/// recording the result is the caller's job, and so is retrying.
#[derive(Clone)]
pub struct SizeProbe {
    client: Arc<dyn DepotClient>,
    timeout: Duration,
}

impl SizeProbe {
    pub fn new(client: Arc<dyn DepotClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn probe(&self, server: &Server, stream: &Stream) -> Result<Measurement, EngineError> {
        let started = std::time::Instant::now();
        let measured =
            tokio::time::timeout(self.timeout, self.client.measure_stream(server, &stream.name))
                .await;

        let result = match measured {
            Ok(Ok(measurement)) => {
                tracing::debug!(
                    "[Probe] {} on {}: {} bytes, {} files in {:?}",
                    stream.name,
                    server.name,
                    measurement.size_bytes,
                    measurement.file_count,
                    started.elapsed()
                );
                Ok(measurement)
            },
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    "[Probe] {} on {} exceeded {:?}",
                    stream.name,
                    server.name,
                    self.timeout
                );
                Err(EngineError::Timeout {
                    target: TargetKey::Stream(stream.id).to_string(),
                    seconds: self.timeout.as_secs(),
                })
            },
        };
        let outcome = metrics::outcome_label(result.as_ref().err());
        metrics::record_measurement(outcome, started.elapsed());
        result
    }
}
