//! Domain models shared between the engine and the HTTP layer.

mod config;
mod history;
mod server;
mod stats;
mod stream;

pub use config::{
    validate_server_entries, AppConfig, HistoryConfig, HttpConfig, InFlightConfig, ProbeConfig,
    SchedulerConfig, ServerEntry, DEFAULT_STREAM_MASK,
};
pub use history::HistoryRecord;
pub use server::{Server, ServerOverview};
pub use stats::{EngineStats, InFlightEntry, RefreshStats, ServerSyncStats, StreamSyncStats};
pub use stream::{Measurement, Stream};
