//! Typed error definitions for Streamwatch.
//!
//! All errors are:
//!
//! - **Serializable** for API responses via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for status mapping via enum variants

mod config;
mod engine;

pub use config::ConfigError;
pub use engine::EngineError;
