//! Runtime record of one workflow run against a workplace.
//!
//! `WorkflowContext` owns the run's data model tree and program counter,
//! its lifecycle state, and the metadata of a pending completion wait
//! (event type, accepted hints, event generator and timeout). Worklets
//! request asynchronous completion through [`WorkflowContext::wait_completion`]
//! or [`WorkflowContext::wait_for`]; the engine reads those requests after
//! `process` returns.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use worklet_types::data_model::JsonDataModelTree;
use worklet_types::error::WorkflowError;
use worklet_types::program_counter::ProgramCounter;
use worklet_types::workflow::{WorkflowState, context_name};

/// Callback that (re)generates the event a context is waiting for.
pub type EventGenerator = Arc<dyn Fn() -> Result<(), WorkflowError> + Send + Sync>;

/// A trigger registration requested by a trigger worklet's `register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRegistration {
    pub event_type: String,
    pub hints: BTreeSet<String>,
}

// ---------------------------------------------------------------------------
// WorkflowContext
// ---------------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize)]
pub struct WorkflowContext {
    name: String,
    workflow_id: String,
    workplace_name: String,
    data: JsonDataModelTree,
    current: ProgramCounter,
    state: WorkflowState,
    cause: Option<String>,
    trigger_next: bool,
    completion_event_type: Option<String>,
    completion_event_hints: BTreeSet<String>,
    #[serde(skip)]
    completion_event_generator: Option<EventGenerator>,
    completion_event_timeout: Option<Duration>,
    timeout: Option<Duration>,
    /// Bumped by every new wait; timeout tasks carry the value they were armed for.
    #[serde(default)]
    wait_seq: u64,
    #[serde(skip)]
    trigger_registrations: Vec<TriggerRegistration>,
    #[serde(skip)]
    pending_logs: Vec<String>,
}

impl WorkflowContext {
    /// Create a context for `workflow_id` in `workplace_name`, positioned at INIT.
    pub fn new(
        workplace_name: impl Into<String>,
        workflow_id: impl Into<String>,
        data: JsonDataModelTree,
    ) -> Self {
        let workplace_name = workplace_name.into();
        let workflow_id = workflow_id.into();
        Self {
            name: context_name(&workplace_name, &workflow_id, None),
            workflow_id,
            workplace_name,
            data,
            current: ProgramCounter::init(),
            state: WorkflowState::Idle,
            cause: None,
            trigger_next: true,
            completion_event_type: None,
            completion_event_hints: BTreeSet::new(),
            completion_event_generator: None,
            completion_event_timeout: None,
            timeout: None,
            wait_seq: 0,
            trigger_registrations: Vec::new(),
            pending_logs: Vec::new(),
        }
    }

    /// Append a uniqueness suffix to the context name.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.name = context_name(&self.workplace_name, &self.workflow_id, Some(suffix));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn workplace_name(&self) -> &str {
        &self.workplace_name
    }

    pub fn data(&self) -> &JsonDataModelTree {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut JsonDataModelTree {
        &mut self.data
    }

    pub fn current(&self) -> &ProgramCounter {
        &self.current
    }

    pub fn set_current(&mut self, pc: ProgramCounter) {
        self.current = pc;
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn set_state(&mut self, state: WorkflowState) {
        self.state = state;
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }

    pub fn set_cause(&mut self, cause: Option<String>) {
        self.cause = cause;
    }

    /// Whether the engine should evaluate the next step once the current
    /// worklet's synchronous work is done.
    pub fn trigger_next(&self) -> bool {
        self.trigger_next
    }

    pub fn set_trigger_next(&mut self, trigger_next: bool) {
        self.trigger_next = trigger_next;
    }

    // -----------------------------------------------------------------------
    // Completion waits
    // -----------------------------------------------------------------------

    /// Wait for an event of `event_type` carrying `hint`.
    ///
    /// The engine registers the wait, then calls `generator` to provoke the
    /// event. A zero `timeout` waits forever.
    pub fn wait_completion(
        &mut self,
        event_type: impl Into<String>,
        hint: impl Into<String>,
        generator: EventGenerator,
        timeout: Duration,
    ) {
        self.wait_completion_hints(event_type, [hint.into()], generator, timeout);
    }

    /// Like [`wait_completion`](Self::wait_completion), accepting any of `hints`.
    pub fn wait_completion_hints(
        &mut self,
        event_type: impl Into<String>,
        hints: impl IntoIterator<Item = String>,
        generator: EventGenerator,
        timeout: Duration,
    ) {
        self.completion_event_type = Some(event_type.into());
        self.completion_event_hints = hints.into_iter().collect();
        self.completion_event_generator = Some(generator);
        self.completion_event_timeout = (!timeout.is_zero()).then_some(timeout);
        self.trigger_next = false;
        self.wait_seq += 1;
    }

    /// Pause for `timeout`; the current worklet's `timeout` runs when it elapses.
    pub fn wait_for(&mut self, timeout: Duration) {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self.trigger_next = false;
        self.wait_seq += 1;
    }

    pub fn completion_event_type(&self) -> Option<&str> {
        self.completion_event_type.as_deref()
    }

    /// Hints accepted by the pending wait. A set is the canonical form;
    /// [`completion_event_hint`](Self::completion_event_hint) is its first element.
    pub fn completion_event_hints(&self) -> &BTreeSet<String> {
        &self.completion_event_hints
    }

    pub fn completion_event_hint(&self) -> Option<&str> {
        self.completion_event_hints.iter().next().map(String::as_str)
    }

    pub fn completion_event_generator(&self) -> Option<&EventGenerator> {
        self.completion_event_generator.as_ref()
    }

    pub fn completion_event_timeout(&self) -> Option<Duration> {
        self.completion_event_timeout
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Sequence number of the latest wait. Survives [`clear_wait`](Self::clear_wait).
    pub fn wait_seq(&self) -> u64 {
        self.wait_seq
    }

    /// Forget any pending wait.
    pub fn clear_wait(&mut self) {
        self.completion_event_type = None;
        self.completion_event_hints.clear();
        self.completion_event_generator = None;
        self.completion_event_timeout = None;
        self.timeout = None;
    }

    // -----------------------------------------------------------------------
    // Triggers and logs
    // -----------------------------------------------------------------------

    /// Ask the engine to route `event_type` events with any of `hints` to
    /// the trigger worklet currently registering.
    pub fn register_trigger_event(
        &mut self,
        event_type: impl Into<String>,
        hints: impl IntoIterator<Item = String>,
    ) {
        self.trigger_registrations.push(TriggerRegistration {
            event_type: event_type.into(),
            hints: hints.into_iter().collect(),
        });
    }

    pub fn take_trigger_registrations(&mut self) -> Vec<TriggerRegistration> {
        std::mem::take(&mut self.trigger_registrations)
    }

    /// Queue a line for the context's log; the engine flushes it to the log store.
    pub fn log(&mut self, message: impl Into<String>) {
        self.pending_logs.push(message.into());
    }

    pub fn take_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_logs)
    }
}

impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("name", &self.name)
            .field("current", &self.current.to_string())
            .field("state", &self.state)
            .field("cause", &self.cause)
            .field("trigger_next", &self.trigger_next)
            .field("completion_event_type", &self.completion_event_type)
            .field("completion_event_hints", &self.completion_event_hints)
            .field("completion_event_timeout", &self.completion_event_timeout)
            .field("timeout", &self.timeout)
            .field("wait_seq", &self.wait_seq)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_generator() -> EventGenerator {
        Arc::new(|| Ok(()))
    }

    #[test]
    fn new_context_starts_idle_at_init() {
        let ctx = WorkflowContext::new("lab", "of:wf", JsonDataModelTree::new());
        assert_eq!(ctx.name(), "lab:of:wf");
        assert_eq!(ctx.current(), &ProgramCounter::init());
        assert_eq!(ctx.state(), WorkflowState::Idle);
        assert!(ctx.trigger_next());
        assert!(ctx.completion_event_type().is_none());

        let ctx = ctx.with_suffix("2");
        assert_eq!(ctx.name(), "lab:of:wf:2");
    }

    #[test]
    fn wait_completion_records_wait_and_stops_stepping() {
        let mut ctx = WorkflowContext::new("lab", "of:wf", JsonDataModelTree::new());
        ctx.wait_completion("PortUp", "of:1/2", noop_generator(), Duration::from_millis(500));

        assert_eq!(ctx.completion_event_type(), Some("PortUp"));
        assert_eq!(ctx.completion_event_hint(), Some("of:1/2"));
        assert_eq!(ctx.completion_event_timeout(), Some(Duration::from_millis(500)));
        assert!(ctx.completion_event_generator().is_some());
        assert!(!ctx.trigger_next());

        ctx.clear_wait();
        assert!(ctx.completion_event_type().is_none());
        assert!(ctx.completion_event_hints().is_empty());
        assert!(ctx.completion_event_generator().is_none());
    }

    #[test]
    fn every_wait_gets_a_fresh_sequence_number() {
        let mut ctx = WorkflowContext::new("lab", "of:wf", JsonDataModelTree::new());
        assert_eq!(ctx.wait_seq(), 0);
        ctx.wait_completion("PortUp", "h", noop_generator(), Duration::from_millis(500));
        let first = ctx.wait_seq();
        ctx.clear_wait();
        assert_eq!(ctx.wait_seq(), first);
        ctx.wait_completion("PortUp", "h", noop_generator(), Duration::from_millis(500));
        assert!(ctx.wait_seq() > first);
        let second = ctx.wait_seq();
        ctx.wait_for(Duration::from_millis(10));
        assert!(ctx.wait_seq() > second);
    }

    #[test]
    fn zero_timeout_means_no_deadline() {
        let mut ctx = WorkflowContext::new("lab", "of:wf", JsonDataModelTree::new());
        ctx.wait_completion("PortUp", "h", noop_generator(), Duration::ZERO);
        assert_eq!(ctx.completion_event_timeout(), None);
        ctx.wait_for(Duration::ZERO);
        assert_eq!(ctx.timeout(), None);
    }

    #[test]
    fn hints_are_a_set() {
        let mut ctx = WorkflowContext::new("lab", "of:wf", JsonDataModelTree::new());
        ctx.wait_completion_hints(
            "PortUp",
            ["b".to_string(), "a".to_string(), "b".to_string()],
            noop_generator(),
            Duration::ZERO,
        );
        assert_eq!(ctx.completion_event_hints().len(), 2);
        assert_eq!(ctx.completion_event_hint(), Some("a"));
    }

    #[test]
    fn serde_round_trip_drops_generator() {
        let mut ctx = WorkflowContext::new(
            "lab",
            "of:wf",
            JsonDataModelTree::from_value(json!({ "ip": "10.0.0.1" })),
        );
        ctx.set_current(ProgramCounter::new("Wait", 1));
        ctx.wait_completion("PortUp", "h", noop_generator(), Duration::from_secs(1));

        let text = serde_json::to_string(&ctx).unwrap();
        let back: WorkflowContext = serde_json::from_str(&text).unwrap();
        assert_eq!(back.name(), "lab:of:wf");
        assert_eq!(back.current(), &ProgramCounter::new("Wait", 1));
        assert_eq!(back.completion_event_type(), Some("PortUp"));
        assert!(back.completion_event_generator().is_none());
        assert_eq!(back.wait_seq(), ctx.wait_seq());
        assert_eq!(back.data().text_at("/ip").unwrap().as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn logs_and_trigger_registrations_drain() {
        let mut ctx = WorkflowContext::new("lab", "of:wf", JsonDataModelTree::new());
        ctx.log("configured device");
        ctx.register_trigger_event("DeviceEvent", ["of:1".to_string()]);
        assert_eq!(ctx.take_logs(), vec!["configured device".to_string()]);
        assert!(ctx.take_logs().is_empty());
        let registrations = ctx.take_trigger_registrations();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].event_type, "DeviceEvent");
    }
}
