//! MCP (Model Context Protocol) server over stdio.
//!
//! Exposes a [`registry::ToolRegistry`] to MCP clients via line-delimited
//! JSON-RPC 2.0. The [`StdioServer`] handles `initialize`, `ping`,
//! `tools/list`, and `tools/call`, giving each call a fresh request
//! context and mapping registry failures onto JSON-RPC error codes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcp::StdioServer;
//! use registry::ToolRegistry;
//!
//! # async fn example() -> mcp::Result<()> {
//! let registry = Arc::new(ToolRegistry::new());
//! StdioServer::new(registry).serve().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod server;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, RequestId, ServerCapabilities, ServerInfo,
    ToolContent, ToolDescriptor, ToolsCapability,
};
pub use server::{MAX_FRAME_SIZE, StdioServer};
