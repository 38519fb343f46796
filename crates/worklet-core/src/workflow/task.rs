//! Handler tasks: immutable commands fed back into the engine when an
//! event arrives, a wait elapses, or a trigger fires.
//!
//! Every task is built through a builder whose `build()` checks required
//! fields, so a partially filled task is never observable.

use std::collections::BTreeSet;

use worklet_types::error::WorkflowError;
use worklet_types::event::Event;
use worklet_types::program_counter::ProgramCounter;

fn required<T>(value: Option<T>, builder: &'static str, field: &'static str) -> Result<T, WorkflowError> {
    value.ok_or(WorkflowError::MissingField { builder, field })
}

// ---------------------------------------------------------------------------
// HandlerTask
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum HandlerTask {
    Event(EventTask),
    EventTimeout(EventTimeoutTask),
    Timeout(TimeoutTask),
    Trigger(TriggerTask),
}

impl HandlerTask {
    pub fn context_name(&self) -> &str {
        match self {
            HandlerTask::Event(task) => &task.context_name,
            HandlerTask::EventTimeout(task) => &task.context_name,
            HandlerTask::Timeout(task) => &task.context_name,
            HandlerTask::Trigger(task) => &task.context_name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            HandlerTask::Event(_) => "event",
            HandlerTask::EventTimeout(_) => "event_timeout",
            HandlerTask::Timeout(_) => "timeout",
            HandlerTask::Trigger(_) => "trigger",
        }
    }
}

// ---------------------------------------------------------------------------
// EventTask
// ---------------------------------------------------------------------------

/// An event relevant to a waiting context arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTask {
    event: Event,
    event_hint: String,
    context_name: String,
    program_counter: ProgramCounter,
}

impl EventTask {
    pub fn builder() -> EventTaskBuilder {
        EventTaskBuilder::default()
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }

    pub fn event_hint(&self) -> &str {
        &self.event_hint
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    pub fn program_counter(&self) -> &ProgramCounter {
        &self.program_counter
    }
}

#[derive(Debug, Default)]
pub struct EventTaskBuilder {
    event: Option<Event>,
    event_hint: Option<String>,
    context_name: Option<String>,
    program_counter: Option<ProgramCounter>,
}

impl EventTaskBuilder {
    pub fn event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }

    pub fn event_hint(mut self, hint: impl Into<String>) -> Self {
        self.event_hint = Some(hint.into());
        self
    }

    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = Some(name.into());
        self
    }

    pub fn program_counter(mut self, pc: ProgramCounter) -> Self {
        self.program_counter = Some(pc);
        self
    }

    pub fn build(self) -> Result<EventTask, WorkflowError> {
        Ok(EventTask {
            event: required(self.event, "EventTask", "event")?,
            event_hint: required(self.event_hint, "EventTask", "event_hint")?,
            context_name: required(self.context_name, "EventTask", "context_name")?,
            program_counter: required(self.program_counter, "EventTask", "program_counter")?,
        })
    }
}

// ---------------------------------------------------------------------------
// EventTimeoutTask
// ---------------------------------------------------------------------------

/// A registered event wait elapsed without being satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTimeoutTask {
    event_type: String,
    event_hints: BTreeSet<String>,
    context_name: String,
    program_counter: ProgramCounter,
    wait_seq: u64,
}

impl EventTimeoutTask {
    pub fn builder() -> EventTimeoutTaskBuilder {
        EventTimeoutTaskBuilder::default()
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_hints(&self) -> &BTreeSet<String> {
        &self.event_hints
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    pub fn program_counter(&self) -> &ProgramCounter {
        &self.program_counter
    }

    /// The context's wait sequence number when this timeout was armed.
    pub fn wait_seq(&self) -> u64 {
        self.wait_seq
    }
}

#[derive(Debug, Default)]
pub struct EventTimeoutTaskBuilder {
    event_type: Option<String>,
    event_hints: BTreeSet<String>,
    context_name: Option<String>,
    program_counter: Option<ProgramCounter>,
    wait_seq: u64,
}

impl EventTimeoutTaskBuilder {
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn event_hints(mut self, hints: impl IntoIterator<Item = String>) -> Self {
        self.event_hints.extend(hints);
        self
    }

    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = Some(name.into());
        self
    }

    pub fn program_counter(mut self, pc: ProgramCounter) -> Self {
        self.program_counter = Some(pc);
        self
    }

    pub fn wait_seq(mut self, wait_seq: u64) -> Self {
        self.wait_seq = wait_seq;
        self
    }

    pub fn build(self) -> Result<EventTimeoutTask, WorkflowError> {
        if self.event_hints.is_empty() {
            return Err(WorkflowError::MissingField {
                builder: "EventTimeoutTask",
                field: "event_hints",
            });
        }
        Ok(EventTimeoutTask {
            event_type: required(self.event_type, "EventTimeoutTask", "event_type")?,
            event_hints: self.event_hints,
            context_name: required(self.context_name, "EventTimeoutTask", "context_name")?,
            program_counter: required(self.program_counter, "EventTimeoutTask", "program_counter")?,
            wait_seq: self.wait_seq,
        })
    }
}

// ---------------------------------------------------------------------------
// TimeoutTask
// ---------------------------------------------------------------------------

/// A plain step timeout (`wait_for`) elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutTask {
    context_name: String,
    program_counter: ProgramCounter,
    wait_seq: u64,
}

impl TimeoutTask {
    pub fn builder() -> TimeoutTaskBuilder {
        TimeoutTaskBuilder::default()
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    pub fn program_counter(&self) -> &ProgramCounter {
        &self.program_counter
    }

    pub fn wait_seq(&self) -> u64 {
        self.wait_seq
    }
}

#[derive(Debug, Default)]
pub struct TimeoutTaskBuilder {
    context_name: Option<String>,
    program_counter: Option<ProgramCounter>,
    wait_seq: u64,
}

impl TimeoutTaskBuilder {
    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = Some(name.into());
        self
    }

    pub fn program_counter(mut self, pc: ProgramCounter) -> Self {
        self.program_counter = Some(pc);
        self
    }

    pub fn wait_seq(mut self, wait_seq: u64) -> Self {
        self.wait_seq = wait_seq;
        self
    }

    pub fn build(self) -> Result<TimeoutTask, WorkflowError> {
        Ok(TimeoutTask {
            context_name: required(self.context_name, "TimeoutTask", "context_name")?,
            program_counter: required(self.program_counter, "TimeoutTask", "program_counter")?,
            wait_seq: self.wait_seq,
        })
    }
}

// ---------------------------------------------------------------------------
// TriggerTask
// ---------------------------------------------------------------------------

/// An event matched a trigger worklet's registration.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerTask {
    event: Event,
    event_hint: String,
    context_name: String,
    worklet_type: String,
}

impl TriggerTask {
    pub fn builder() -> TriggerTaskBuilder {
        TriggerTaskBuilder::default()
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn event_hint(&self) -> &str {
        &self.event_hint
    }

    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    pub fn worklet_type(&self) -> &str {
        &self.worklet_type
    }
}

#[derive(Debug, Default)]
pub struct TriggerTaskBuilder {
    event: Option<Event>,
    event_hint: Option<String>,
    context_name: Option<String>,
    worklet_type: Option<String>,
}

impl TriggerTaskBuilder {
    pub fn event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }

    pub fn event_hint(mut self, hint: impl Into<String>) -> Self {
        self.event_hint = Some(hint.into());
        self
    }

    pub fn context_name(mut self, name: impl Into<String>) -> Self {
        self.context_name = Some(name.into());
        self
    }

    pub fn worklet_type(mut self, worklet_type: impl Into<String>) -> Self {
        self.worklet_type = Some(worklet_type.into());
        self
    }

    pub fn build(self) -> Result<TriggerTask, WorkflowError> {
        Ok(TriggerTask {
            event: required(self.event, "TriggerTask", "event")?,
            event_hint: required(self.event_hint, "TriggerTask", "event_hint")?,
            context_name: required(self.context_name, "TriggerTask", "context_name")?,
            worklet_type: required(self.worklet_type, "TriggerTask", "worklet_type")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn event_task_builds_with_all_fields() {
        let task = EventTask::builder()
            .event(Event::new("PortUp", "of:1/2", Value::Null))
            .event_hint("of:1/2")
            .context_name("lab:of:wf")
            .program_counter(ProgramCounter::new("Wait", 1))
            .build()
            .unwrap();
        assert_eq!(task.event_type(), "PortUp");
        assert_eq!(task.program_counter().to_string(), "(1)Wait");
        assert_eq!(HandlerTask::Event(task).context_name(), "lab:of:wf");
    }

    #[test]
    fn builders_fail_fast_on_missing_fields() {
        let err = EventTask::builder()
            .event(Event::new("PortUp", "of:1/2", Value::Null))
            .context_name("lab:of:wf")
            .program_counter(ProgramCounter::new("Wait", 1))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::MissingField { builder: "EventTask", field: "event_hint" }
        ));

        let err = TimeoutTask::builder().context_name("c").build().unwrap_err();
        assert!(matches!(err, WorkflowError::MissingField { field: "program_counter", .. }));

        let err = EventTimeoutTask::builder()
            .event_type("PortUp")
            .context_name("c")
            .program_counter(ProgramCounter::new("Wait", 1))
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MissingField { field: "event_hints", .. }));

        let err = TriggerTask::builder()
            .event(Event::new("DeviceEvent", "of:1", Value::Null))
            .event_hint("of:1")
            .context_name("c")
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MissingField { field: "worklet_type", .. }));
    }

    #[test]
    fn event_timeout_task_collects_hints() {
        let task = EventTimeoutTask::builder()
            .event_type("PortUp")
            .event_hints(["b".to_string(), "a".to_string()])
            .context_name("c")
            .program_counter(ProgramCounter::new("Wait", 1))
            .wait_seq(3)
            .build()
            .unwrap();
        assert_eq!(task.event_hints().len(), 2);
        assert_eq!(task.wait_seq(), 3);
        assert_eq!(HandlerTask::EventTimeout(task).kind(), "event_timeout");
    }
}
