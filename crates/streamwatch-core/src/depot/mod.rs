//! Depot access.
//!
//! `DepotClient` is the only place the engine talks to a version-control
//! server. The production implementation shells out to the `p4` CLI; tests
//! plug in scripted clients.

mod fstat;
mod p4;

pub use fstat::{normalize_stream_path, parse_fstat_sizes};
pub use p4::P4CliClient;

use async_trait::async_trait;
use streamwatch_types::{EngineError, Measurement, Server};

#[async_trait]
pub trait DepotClient: Send + Sync {
    /// Stream paths on `server` matching its stream mask.
    async fn list_streams(&self, server: &Server) -> Result<Vec<String>, EngineError>;

    /// Total size and count of non-deleted head revisions in `stream`.
    async fn measure_stream(&self, server: &Server, stream: &str)
        -> Result<Measurement, EngineError>;

    /// Whether a valid ticket exists for the server's user.
    async fn check_auth(&self, server: &Server) -> Result<bool, EngineError>;

    /// Obtain a ticket for the server's user with `password` and confirm the
    /// server answers with it.
    async fn login(&self, server: &Server, password: &str) -> Result<(), EngineError>;
}
