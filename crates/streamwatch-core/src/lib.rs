//! # Streamwatch Core
//!
//! Stream-size polling and history engine.
//!
//! ```text
//! streamwatch-core/src/
//! ├── depot/            # DepotClient trait, p4 CLI client, fstat parsing
//! ├── modules/
//! │   ├── config.rs     # YAML configuration loading
//! │   ├── database.rs   # shared SQLite connection + schema
//! │   ├── registry.rs   # ServerRegistry (config reconciliation)
//! │   ├── catalog.rs    # StreamCatalog (live stream reconciliation)
//! │   ├── probe.rs      # SizeProbe (one deadline-bounded measurement)
//! │   ├── history.rs    # HistoryStore (append-only time series)
//! │   ├── inflight.rs   # InFlightSet (per-target admission)
//! │   ├── metrics.rs    # Prometheus counters and gauges
//! │   └── coordinator.rs# RefreshCoordinator
//! └── utils/            # data dir paths, size formatting
//! ```

#![allow(
    clippy::significant_drop_tightening,
    reason = "Mutex guards around the SQLite connection are scoped to one statement batch"
)]
#![allow(clippy::map_err_ignore, reason = "Error context is provided in the replacement message")]
#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::assertions_on_result_states
    )
)]

pub mod depot;
pub mod error;
pub mod modules;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use depot::{DepotClient, P4CliClient};
pub use error::{AppError, AppResult};
pub use modules::catalog::StreamCatalog;
pub use modules::config::{load_config, load_config_or_default, load_server_entries};
pub use modules::coordinator::{RefreshCoordinator, StreamRefresh};
pub use modules::database::Database;
pub use modules::history::HistoryStore;
pub use modules::inflight::{InFlightGuard, InFlightSet, TargetKey};
pub use modules::metrics;
pub use modules::probe::SizeProbe;
pub use modules::registry::ServerRegistry;
