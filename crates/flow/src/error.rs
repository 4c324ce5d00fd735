//! Flow and provider error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Failure talking to a completion provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow not found: {0}")]
    FlowNotFound(String),

    #[error("flow '{flow}' references unknown step '{step}'")]
    StepNotFound { flow: String, step: String },

    #[error("step '{step}' requires provider '{provider}', which is not configured")]
    ProviderNotFound { step: String, provider: String },

    #[error("flow '{flow}' exceeded the step limit of {limit}")]
    StepLimitExceeded { flow: String, limit: u32 },

    #[error("invalid flow definition '{flow}': {message}")]
    InvalidFlow { flow: String, message: String },

    #[error("failed to read flow file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse flow file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
