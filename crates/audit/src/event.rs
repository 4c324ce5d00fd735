//! Event types for the workflow audit log.

use chrono::{DateTime, Utc};
use context::WorkflowId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of event that occurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A workflow started.
    WorkflowStart,
    /// A tool was invoked.
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },
    /// A tool call finished, successfully or not.
    ToolOutcome {
        name: String,
        ok: bool,
        detail: String,
    },
    /// A flow step ran.
    FlowStep { flow: String, step: String },
    /// A workflow ended.
    WorkflowEnd,
}

impl EventKind {
    /// Stable name used for filtering queries.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::WorkflowStart => "workflow_start",
            EventKind::ToolCall { .. } => "tool_call",
            EventKind::ToolOutcome { .. } => "tool_outcome",
            EventKind::FlowStep { .. } => "flow_step",
            EventKind::WorkflowEnd => "workflow_end",
        }
    }
}

/// An event in the workflow log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub workflow_id: WorkflowId,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
}

impl Event {
    pub fn new(workflow_id: WorkflowId, kind: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn tool_call(
        workflow_id: WorkflowId,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self::new(
            workflow_id,
            EventKind::ToolCall {
                name: name.into(),
                arguments,
            },
        )
    }

    pub fn tool_outcome(
        workflow_id: WorkflowId,
        name: impl Into<String>,
        ok: bool,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(
            workflow_id,
            EventKind::ToolOutcome {
                name: name.into(),
                ok,
                detail: detail.into(),
            },
        )
    }
}
