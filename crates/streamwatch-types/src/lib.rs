//! # Streamwatch Types
//!
//! Domain models and typed errors shared by the Streamwatch crates.
//!
//! - **`error`** - Typed error hierarchy for engine operations and configuration
//! - **`models`** - Servers, streams, history records, refresh outcomes, config
//!
//! ## Architecture Role
//!
//! ```text
//!            streamwatch-types (this crate)
//!                      │
//!                      ▼
//!              streamwatch-core
//!                      │
//!                      ▼
//!             streamwatch-server
//! ```
//!
//! Everything here is serde-serializable so the HTTP layer can return it as is.

pub mod error;
pub mod models;

pub use error::{ConfigError, EngineError};

pub use models::{
    AppConfig, HistoryRecord, Measurement, RefreshStats, Server, ServerEntry, Stream,
    StreamSyncStats,
};
