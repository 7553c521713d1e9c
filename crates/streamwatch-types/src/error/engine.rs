//! Engine errors: depot access, admission control and history writes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while syncing, probing or recording streams.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum EngineError {
    /// The depot server could not be reached or the client failed to run
    #[error("Server {server} unavailable: {message}")]
    UpstreamUnavailable {
        /// Address (p4port) of the server
        server: String,
        /// Description of the failure
        message: String,
    },

    /// The depot server rejected our credentials
    #[error("Authentication failed on {server}: {message}")]
    AuthError {
        /// Address (p4port) of the server
        server: String,
        /// Message reported by the server
        message: String,
    },

    /// A server or stream does not exist (locally or upstream)
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What was looked up ("server", "stream")
        entity: String,
        /// Identifier used in the lookup
        id: String,
    },

    /// A depot call exceeded its deadline
    #[error("Operation on {target} timed out after {seconds}s")]
    Timeout {
        /// Target key of the timed-out operation
        target: String,
        /// Configured deadline in seconds
        seconds: u64,
    },

    /// Another operation already holds this target
    #[error("Operation already in progress for {target}")]
    OperationBlocked {
        /// Target key that is in flight
        target: String,
    },

    /// A history record already exists at this exact instant
    #[error("History record for stream {stream_id} at {timestamp} already exists")]
    DuplicateTimestamp {
        /// Stream the write was for
        stream_id: i64,
        /// Colliding timestamp (milliseconds since epoch)
        timestamp: i64,
    },

    /// Request or configuration value rejected
    #[error("Validation error for {field}: {message}")]
    Validation {
        /// Offending field
        field: String,
        /// Why it was rejected
        message: String,
    },
}

impl EngineError {
    pub fn server_not_found(id: impl ToString) -> Self {
        Self::NotFound { entity: "server".to_string(), id: id.to_string() }
    }

    pub fn stream_not_found(id: impl ToString) -> Self {
        Self::NotFound { entity: "stream".to_string(), id: id.to_string() }
    }

    /// Check if a later attempt could succeed without operator action.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::Timeout { .. } | Self::OperationBlocked { .. }
        )
    }

    /// Admission was denied; the underlying work never started.
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::OperationBlocked { .. })
    }
}
