//! Registry error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised inside a tool's `execute`.
///
/// Tools should reserve these for genuinely exceptional conditions; a bad
/// input row or an empty result is better returned as a normal value
/// describing the issue, since anything that crosses the registry boundary
/// collapses into a generic execution failure for the caller.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream call failed: {0}")]
    Upstream(String),
    #[error("timeout after {0}ms")]
    Timeout(u64),
    #[error("execution failed: {0}")]
    Execution(String),
}

/// Protocol-facing errors produced by the registry.
///
/// Transport adapters translate these into their native error representation
/// (e.g. JSON-RPC error codes); callers never see a tool's raw internals.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Registration-time name collision. Fatal configuration error: reject at
    /// startup rather than silently overwriting the first tool.
    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("tool name must not be empty")]
    EmptyToolName,

    /// Dispatch-time lookup miss. Maps to a protocol "method not found".
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Argument parse failure or schema mismatch. Maps to "invalid params".
    #[error("malformed arguments for {tool}: {message}")]
    MalformedArguments { tool: String, message: String },

    /// Uniform wrap of any failure inside a tool's `execute`. Carries the
    /// tool name and the original message; maps to "internal error".
    #[error("tool {tool} failed: {message}")]
    ToolExecution { tool: String, message: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
