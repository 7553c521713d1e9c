//! Tracing setup: stdout plus an optional daily-rotated log file.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

const LOG_FILE_PREFIX: &str = "streamwatch.log";

/// Flushes the file writer when dropped; hold it until exit.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// `level` accepts anything `EnvFilter` parses, e.g. `info` or
/// `streamwatch_core=debug,info`. Falls back to `info` when it does not parse.
pub fn init_logging(level: &str, log_dir: Option<&Path>) -> LoggingGuard {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(fmt::layer().with_target(false).boxed());

    let mut file_guard = None;
    let mut file_error = None;
    if let Some(dir) = log_dir {
        match fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
                file_guard = Some(guard);
            },
            Err(e) => file_error = Some(format!("{}: {}", dir.display(), e)),
        }
    }

    layers.push(Box::new(filter));
    Registry::default().with(layers).init();

    if let Some(err) = file_error {
        tracing::warn!("File logging disabled, cannot create log dir {}", err);
    }
    LoggingGuard { _file: file_guard }
}
