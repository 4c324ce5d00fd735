//! Hierarchical per-request state for tool and flow execution.
//!
//! Every inbound tool or flow invocation gets its own root [`Context`]:
//! a conversation log plus partitioned key/value state (general state,
//! resources, memory, auth, preferences), an append-only action log, and a
//! lazily assigned [`WorkflowId`]. Hand-offs between tools create child
//! contexts via [`Context::create_child`] — children can read everything the
//! parent accumulated but cannot corrupt it.
//!
//! Contexts are never shared across concurrent requests and are discarded
//! when the request completes.

mod context;
mod message;

pub use context::{Context, WorkflowId};
pub use message::{Message, Role};
