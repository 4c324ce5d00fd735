//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The audit database does not exist yet.
    #[error("audit log not found at {path}. Run 'coxswain serve' or 'coxswain run' first")]
    DatabaseNotFound { path: PathBuf },

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Flow(#[from] flow::FlowError),

    #[error(transparent)]
    Registry(#[from] registry::RegistryError),

    #[error(transparent)]
    Audit(#[from] audit::Error),

    #[error(transparent)]
    Transport(#[from] mcp::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
