//! SQLite event store implementation.

use std::path::Path;

use chrono::{DateTime, Utc};
use context::WorkflowId;
use rusqlite::{Connection, params};

use crate::error::{Error, Result};
use crate::event::{Event, EventKind};

/// A workflow as seen in the log: its id and activity bounds.
#[derive(Debug, Clone)]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub started: DateTime<Utc>,
    pub last_event: DateTime<Utc>,
    pub event_count: u64,
}

/// SQLite-backed append-only event store.
pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    /// Open or create an event store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory event store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                kind TEXT NOT NULL,
                data TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_workflow
                ON events(workflow_id, timestamp);
            "#,
        )?;
        Ok(())
    }

    /// Append an event to the store.
    pub fn append(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            "INSERT INTO events (id, workflow_id, timestamp, kind, data) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.id.to_string(),
                event.workflow_id.to_string(),
                event.timestamp.to_rfc3339(),
                event.kind.name(),
                serde_json::to_string(&event.kind)?,
            ],
        )?;
        Ok(())
    }

    /// Load all events for a workflow, ordered by timestamp. An optional
    /// kind name narrows the result.
    pub fn load_workflow(
        &self,
        workflow_id: WorkflowId,
        kind: Option<&str>,
    ) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, workflow_id, timestamp, data FROM events
             WHERE workflow_id = ?1 AND (?2 IS NULL OR kind = ?2)
             ORDER BY timestamp, rowid",
        )?;

        let events = stmt
            .query_map(params![workflow_id.to_string(), kind], |row| {
                let id: String = row.get(0)?;
                let workflow_id: String = row.get(1)?;
                let timestamp: String = row.get(2)?;
                let data: String = row.get(3)?;
                Ok((id, workflow_id, timestamp, data))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, workflow_id, timestamp, data)| {
                Some(Event {
                    id: id.parse().ok()?,
                    workflow_id: WorkflowId(workflow_id.parse().ok()?),
                    timestamp: timestamp.parse().ok()?,
                    kind: serde_json::from_str(&data).ok()?,
                })
            })
            .collect();

        Ok(events)
    }

    /// List every workflow in the log, most recently active first.
    pub fn list_workflows(&self) -> Result<Vec<WorkflowSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT workflow_id, MIN(timestamp), MAX(timestamp), COUNT(*)
             FROM events GROUP BY workflow_id ORDER BY MAX(timestamp) DESC",
        )?;

        let summaries = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let started: String = row.get(1)?;
                let last_event: String = row.get(2)?;
                let event_count: i64 = row.get(3)?;
                Ok((id, started, last_event, event_count))
            })?
            .filter_map(|r| r.ok())
            .filter_map(|(id, started, last_event, event_count)| {
                Some(WorkflowSummary {
                    id: WorkflowId(id.parse().ok()?),
                    started: started.parse().ok()?,
                    last_event: last_event.parse().ok()?,
                    event_count: event_count as u64,
                })
            })
            .collect();

        Ok(summaries)
    }

    /// Resolve a workflow id prefix, as typed on the command line, to the
    /// single workflow it identifies.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<WorkflowId> {
        let matches: Vec<WorkflowId> = self
            .list_workflows()?
            .into_iter()
            .map(|s| s.id)
            .filter(|id| id.to_string().starts_with(prefix))
            .collect();

        match matches.as_slice() {
            [] => Err(Error::NotFound(format!("no workflow matching '{prefix}'"))),
            [id] => Ok(*id),
            _ => Err(Error::AmbiguousPrefix(prefix.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_workflow() -> (EventStore, WorkflowId) {
        let store = EventStore::in_memory().unwrap();
        let id = WorkflowId::new();
        store.append(&Event::new(id, EventKind::WorkflowStart)).unwrap();
        store
            .append(&Event::tool_call(id, "echo", json!({"text": "hi"})))
            .unwrap();
        store
            .append(&Event::tool_outcome(id, "echo", true, "\"hi\""))
            .unwrap();
        store.append(&Event::new(id, EventKind::WorkflowEnd)).unwrap();
        (store, id)
    }

    #[test]
    fn events_round_trip() {
        let (store, id) = store_with_workflow();
        let events = store.load_workflow(id, None).unwrap();

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0].kind, EventKind::WorkflowStart));
        match &events[1].kind {
            EventKind::ToolCall { name, arguments } => {
                assert_eq!(name, "echo");
                assert_eq!(arguments, &json!({"text": "hi"}));
            }
            other => panic!("expected ToolCall, got {other:?}"),
        }
        match &events[2].kind {
            EventKind::ToolOutcome { name, ok, detail } => {
                assert_eq!(name, "echo");
                assert!(ok);
                assert_eq!(detail, "\"hi\"");
            }
            other => panic!("expected ToolOutcome, got {other:?}"),
        }
    }

    #[test]
    fn kind_filter_narrows_results() {
        let (store, id) = store_with_workflow();
        let events = store.load_workflow(id, Some("tool_call")).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].kind, EventKind::ToolCall { .. }));
    }

    #[test]
    fn workflows_are_isolated() {
        let (store, id) = store_with_workflow();
        let other = WorkflowId::new();
        store
            .append(&Event::new(other, EventKind::WorkflowStart))
            .unwrap();

        assert_eq!(store.load_workflow(id, None).unwrap().len(), 4);
        assert_eq!(store.load_workflow(other, None).unwrap().len(), 1);
        assert_eq!(store.list_workflows().unwrap().len(), 2);
    }

    #[test]
    fn summary_counts_events() {
        let (store, id) = store_with_workflow();
        let summaries = store.list_workflows().unwrap();
        assert_eq!(summaries[0].id, id);
        assert_eq!(summaries[0].event_count, 4);
        assert!(summaries[0].started <= summaries[0].last_event);
    }

    #[test]
    fn prefix_resolution() {
        let (store, id) = store_with_workflow();
        let full = id.to_string();

        assert_eq!(store.resolve_prefix(&full[..8]).unwrap(), id);
        assert!(matches!(
            store.resolve_prefix("zzzzzzzz"),
            Err(Error::NotFound(_))
        ));
        // Every UUID matches the empty prefix; with two workflows that is
        // ambiguous.
        let other = WorkflowId::new();
        store
            .append(&Event::new(other, EventKind::WorkflowStart))
            .unwrap();
        assert!(matches!(
            store.resolve_prefix(""),
            Err(Error::AmbiguousPrefix(_))
        ));
    }
}
