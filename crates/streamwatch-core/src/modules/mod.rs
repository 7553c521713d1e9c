pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod history;
pub mod inflight;
pub mod metrics;
pub mod probe;
pub mod registry;

pub use catalog::StreamCatalog;
pub use config::{load_config, load_config_or_default, load_server_entries};
pub use coordinator::{RefreshCoordinator, StreamRefresh};
pub use database::Database;
pub use history::HistoryStore;
pub use inflight::{InFlightGuard, InFlightSet, TargetKey};
pub use probe::SizeProbe;
pub use registry::ServerRegistry;
