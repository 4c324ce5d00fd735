//! Flow definitions and their executor.
//!
//! A flow is a named sequence of provider calls ([`Step`]s) joined by a
//! transition table. The [`FlowExecutor`] walks a flow from its `start`
//! step, threading a shared [`context::Context`] through every step and
//! routing provider tool calls through a [`registry::ToolRegistry`].
//! Definitions load from TOML via [`FlowSet`].

mod error;
mod executor;
mod flow;
mod provider;
pub mod providers;

pub use error::{FlowError, ProviderError, Result};
pub use executor::{DEFAULT_STEP_LIMIT, FlowExecutor, FlowOutcome};
pub use flow::{Flow, FlowSet, Step};
pub use provider::{Completion, CompletionRequest, Provider, ToolCallRequest};
