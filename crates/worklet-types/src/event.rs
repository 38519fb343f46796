//! External events routed to waiting contexts, and workflow data change events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::program_counter::ProgramCounter;
use crate::workflow::WorkflowState;

/// Event type under which context changes are routed through the event map.
pub const WORKFLOW_DATA_EVENT: &str = "WorkflowDataEvent";

/// An event that may satisfy a context's completion wait.
///
/// `event_type` selects the routing table entry; the hint used to pick the
/// waiting contexts is derived from the event by the caller (usually from
/// `subject`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub event_type: String,
    pub subject: String,
    #[serde(default)]
    pub payload: Value,
    pub time: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, subject: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            subject: subject.into(),
            payload,
            time: Utc::now(),
        }
    }
}

/// What happened to a stored context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowDataEventKind {
    Insert,
    Update,
    Remove,
}

impl WorkflowDataEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowDataEventKind::Insert => "insert",
            WorkflowDataEventKind::Update => "update",
            WorkflowDataEventKind::Remove => "remove",
        }
    }
}

/// Published whenever the engine inserts, commits or removes a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDataEvent {
    pub kind: WorkflowDataEventKind,
    pub context_name: String,
    pub state: WorkflowState,
    pub current: ProgramCounter,
    pub time: DateTime<Utc>,
}

impl WorkflowDataEvent {
    pub fn new(
        kind: WorkflowDataEventKind,
        context_name: impl Into<String>,
        state: WorkflowState,
        current: ProgramCounter,
    ) -> Self {
        Self {
            kind,
            context_name: context_name.into(),
            state,
            current,
            time: Utc::now(),
        }
    }

    /// Generic [`Event`] form, with the context name as subject.
    pub fn to_event(&self) -> Event {
        Event::new(
            WORKFLOW_DATA_EVENT,
            self.context_name.clone(),
            serde_json::json!({
                "kind": self.kind.as_str(),
                "state": self.state.as_str(),
                "current": self.current.to_string(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_event_converts_to_routable_event() {
        let data_event = WorkflowDataEvent::new(
            WorkflowDataEventKind::Update,
            "lab:of:wf",
            WorkflowState::Completed,
            ProgramCounter::new("COMPLETED", 3),
        );
        let event = data_event.to_event();
        assert_eq!(event.event_type, WORKFLOW_DATA_EVENT);
        assert_eq!(event.subject, "lab:of:wf");
        assert_eq!(event.payload["state"], "completed");
        assert_eq!(event.payload["current"], "(3)COMPLETED");
    }

    #[test]
    fn events_get_distinct_ids() {
        let a = Event::new("PortUp", "of:0001/1", Value::Null);
        let b = Event::new("PortUp", "of:0001/1", Value::Null);
        assert_ne!(a.id, b.id);
    }
}
