//! Tool registry — registration, discovery, and validated dispatch.
//!
//! This crate owns the boundary between transports and tool implementations:
//!
//! - **Tool**: a named unit of capability with a declared input [`Schema`]
//!   and an async `execute`.
//! - **ToolRegistry**: the tool-name → tool mapping. Registration happens
//!   once at startup (duplicate names are a fatal configuration error);
//!   dispatch goes through [`ToolRegistry::execute_with_validation`], which
//!   records the call in the request context, validates arguments, and
//!   wraps every tool failure into a uniform error envelope.
//! - **RetryPolicy**: shared bounded backoff for tools and providers that
//!   call unreliable upstreams.
//!
//! Errors crossing the registry boundary are always one of the
//! [`RegistryError`] kinds, so transport adapters can map them to protocol
//! errors mechanically and callers never see raw tool internals.

mod error;
mod registry;
mod retry;
mod schema;
mod tool;

pub use error::{RegistryError, Result, ToolError};
pub use registry::ToolRegistry;
pub use retry::RetryPolicy;
pub use schema::{Schema, SchemaMismatch};
pub use tool::{Tool, ToolSpec};
