//! SQLite-backed audit log of workflow activity.
//!
//! Every workflow run leaves a trail here: lifecycle events, tool calls
//! with their arguments, tool outcomes, and flow steps. The log is
//! append-only and queryable per workflow, which is what powers
//! `coxswain logs`.

mod error;
mod event;
mod store;

pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use store::{EventStore, WorkflowSummary};
