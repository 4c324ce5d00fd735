//! Transport error types.

use thiserror::Error;

/// Failures of the transport itself. Protocol-level problems (unknown
/// method, bad params, tool failures) never surface here; they go back
/// to the peer as JSON-RPC error responses.
#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
