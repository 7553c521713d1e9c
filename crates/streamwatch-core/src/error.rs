//! Unified error type for Streamwatch Core.

use serde::Serialize;
use streamwatch_types::{ConfigError, EngineError};
use thiserror::Error;

/// Main error type for all engine operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    /// Typed engine failure (depot, admission, history invariants).
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Configuration could not be loaded or was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database operation failed (SQLite).
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// The typed engine error, if this is one.
    pub const fn engine(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }

    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Engine(EngineError::OperationBlocked { .. }))
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for engine operations.
pub type AppResult<T> = Result<T, AppError>;
