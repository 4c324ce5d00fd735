//! The tool trait and its public metadata.

use async_trait::async_trait;
use context::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;
use crate::schema::Schema;

/// Public metadata for a tool, as exposed by discovery responses.
///
/// This is plain data: it never carries the execution function or any
/// credentials, so it is safe to hand to any transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Schema,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: schema,
        }
    }
}

/// A named, independently invocable unit of capability.
///
/// Tools are created once at startup, registered with a
/// [`ToolRegistry`](crate::ToolRegistry), and immutable thereafter. Any
/// external client or credential a tool needs is injected at construction
/// time; tools never read the environment themselves and must not mutate
/// shared provider clients.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's discovery metadata. The name must be stable for the
    /// process lifetime.
    fn spec(&self) -> ToolSpec;

    /// Execute with schema-validated arguments.
    ///
    /// The context is owned by the current request; tools may read inherited
    /// state and write local state, and may hand off to other tools through
    /// a child context.
    async fn execute(&self, args: Value, ctx: &Context) -> Result<Value, ToolError>;
}
