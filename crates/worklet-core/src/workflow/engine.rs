//! Execution driver.
//!
//! `WorkflowEngine` owns the work queue that every context transition goes
//! through. One consumer ([`WorkflowEngine::run`] or
//! [`WorkflowEngine::run_until_idle`]) drains it at a time, so at most one
//! worklet call is in flight for any context.
//!
//! # Execution flow
//!
//! 1. `invoke` checks the description, runs the init worklet, registers
//!    trigger worklets, stores the context and queues its first evaluation.
//! 2. An evaluation asks the workflow for the next program counter, binds
//!    the data model onto the worklet, calls `process` and writes the bound
//!    fields back.
//! 3. A worklet that asked for a completion wait gets an event map entry
//!    (and an event timeout on the timer chain); one that asked for a plain
//!    wait gets a timeout. Otherwise the program counter advances.
//! 4. Every commit publishes a `WorkflowDataEvent` and routes it through
//!    the event map, then queues the next evaluation if `trigger_next` is
//!    still set.
//! 5. Events and timers come back as handler tasks and resume the waiting
//!    step; a matching trigger restarts the context from INIT.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use worklet_types::config::EngineConfig;
use worklet_types::error::WorkflowError;
use worklet_types::event::{Event, WorkflowDataEvent, WorkflowDataEventKind};
use worklet_types::program_counter::ProgramCounter;
use worklet_types::workflow::{
    WorkflowAttribute, WorkflowDescription, WorkflowState, Workplace, WorkplaceDescription,
};

use crate::event::EventBus;
use crate::repository::EngineStore;

use super::context::WorkflowContext;
use super::definition::Workflow;
use super::injector::{JsonDataModelInjector, StaticDataModelInjector};
use super::registry::WorkletRegistry;
use super::task::{
    EventTask, EventTimeoutTask, HandlerTask, TimeoutTask, TriggerTask,
};
use super::timer::TimerChain;
use super::validator::check_data_model;
use super::worklet::Worklet;

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum WorkItem {
    Eval(String),
    Task(HandlerTask),
}

impl WorkItem {
    fn context_name(&self) -> &str {
        match self {
            WorkItem::Eval(name) => name,
            WorkItem::Task(task) => task.context_name(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            WorkItem::Eval(_) => "eval",
            WorkItem::Task(task) => task.kind(),
        }
    }
}

/// What to do with a context once a work item has been handled.
enum Disposition {
    Commit,
    Remove,
    Skip,
}

// ---------------------------------------------------------------------------
// WorkflowEngine
// ---------------------------------------------------------------------------

pub struct WorkflowEngine<S: EngineStore> {
    store: Arc<S>,
    registry: Arc<WorkletRegistry>,
    timers: TimerChain,
    bus: EventBus,
    config: EngineConfig,
    work_tx: mpsc::UnboundedSender<WorkItem>,
    work_rx: Mutex<mpsc::UnboundedReceiver<WorkItem>>,
}

impl<S: EngineStore> WorkflowEngine<S> {
    /// Create an engine on the current tokio runtime.
    pub fn new(
        store: Arc<S>,
        registry: WorkletRegistry,
        config: EngineConfig,
    ) -> Result<Self, WorkflowError> {
        let (work_tx, work_rx) = mpsc::unbounded_channel();
        Ok(Self {
            store,
            registry: Arc::new(registry),
            timers: TimerChain::new()?,
            bus: EventBus::new(config.event_bus_capacity),
            config,
            work_tx,
            work_rx: Mutex::new(work_rx),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn registry(&self) -> &WorkletRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timers(&self) -> &TimerChain {
        &self.timers
    }

    /// Subscribe to context insert/update/remove notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<WorkflowDataEvent> {
        self.bus.subscribe()
    }

    /// Create the system workplace if it does not exist yet.
    pub async fn bootstrap(&self) -> Result<(), WorkflowError> {
        let name = &self.config.system_workplace;
        if self.store.get_workplace(name).await?.is_none() {
            self.store.register_workplace(Workplace::new(name.clone())).await?;
            tracing::info!(workplace = %name, "created system workplace");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Definitions and workplaces
    // -----------------------------------------------------------------------

    /// Validate `workflow` against the registry and store it.
    pub async fn register_workflow(&self, workflow: Workflow) -> Result<(), WorkflowError> {
        workflow.validate(&self.registry)?;
        let id = workflow.id().to_string();
        self.store.register_workflow(workflow).await?;
        tracing::info!(workflow = %id, "registered workflow");
        Ok(())
    }

    pub async fn create_workplace(
        &self,
        description: WorkplaceDescription,
    ) -> Result<(), WorkflowError> {
        let workplace = description.into_workplace();
        let name = workplace.name.clone();
        self.store.register_workplace(workplace).await?;
        tracing::info!(workplace = %name, "created workplace");
        Ok(())
    }

    /// Remove a workplace together with its contexts and their event maps.
    pub async fn remove_workplace(&self, name: &str) -> Result<bool, WorkflowError> {
        if name == self.config.system_workplace {
            return Err(WorkflowError::message(format!(
                "workplace '{name}' cannot be removed"
            )));
        }
        for context in self.store.workplace_contexts(name).await? {
            self.discard_context(context).await?;
        }
        let removed = self.store.remove_workplace(name).await?;
        if removed {
            tracing::info!(workplace = %name, "removed workplace");
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Contexts
    // -----------------------------------------------------------------------

    /// Start a workflow run. Returns the new context's name.
    pub async fn invoke(&self, description: WorkflowDescription) -> Result<String, WorkflowError> {
        let workflow = self.load_workflow(&description.id).await?;
        if self.store.get_workplace(&description.workplace).await?.is_none() {
            return Err(WorkflowError::message(format!(
                "workplace '{}' does not exist",
                description.workplace
            )));
        }
        check_data_model(&workflow, &self.registry, &description.data)?;

        let mut context =
            WorkflowContext::new(description.workplace, description.id, description.data);
        let name = context.name().to_string();
        if self.store.get_context(&name).await?.is_some() {
            return Err(WorkflowError::message(format!(
                "duplicated workflow context '{name}'"
            )));
        }

        if let Some(init) = workflow.init_worklet_type() {
            tracing::info!(context = %name, worklet = init, "running init worklet");
            let mut worklet = self.registry.instantiate(init)?.into_step("process")?;
            JsonDataModelInjector.inject(&mut *worklet, context.data())?;
            worklet.process(&mut context)?;
            JsonDataModelInjector.inhale(&mut *worklet, context.data_mut())?;
        }
        context.clear_wait();
        context.set_trigger_next(true);
        context.set_state(WorkflowState::Idle);

        self.register_triggers(&workflow, &mut context).await?;
        for line in context.take_logs() {
            self.store.add_log(&name, &line).await?;
        }

        let inserted = WorkflowDataEvent::new(
            WorkflowDataEventKind::Insert,
            &name,
            context.state(),
            context.current().clone(),
        );
        if let Err(e) = self.store.register_context(context).await {
            self.store.unregister_trigger_event_map(&name).await?;
            return Err(e.into());
        }
        tracing::info!(context = %name, workflow = %workflow.id(), "invoked workflow");
        self.publish(inserted).await;
        self.enqueue(WorkItem::Eval(name.clone()));
        Ok(name)
    }

    /// Resume a context: any pending wait is dropped, a failed or completed
    /// context is reset to idle, and an evaluation is queued.
    pub async fn eval(&self, context_name: &str) -> Result<(), WorkflowError> {
        let mut context = self.store.get_context(context_name).await?.ok_or_else(|| {
            WorkflowError::message(format!("workflow context '{context_name}' does not exist"))
        })?;
        if let Some(event_type) = context.completion_event_type() {
            self.store.unregister_event_map(event_type, context_name).await?;
        }
        context.clear_wait();
        context.set_cause(None);
        context.set_state(WorkflowState::Idle);
        context.set_trigger_next(true);
        self.commit(context).await
    }

    /// Terminate a context. Returns `true` if it existed.
    pub async fn remove_context(&self, context_name: &str) -> Result<bool, WorkflowError> {
        match self.store.get_context(context_name).await? {
            Some(context) => {
                self.discard_context(context).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Queue a handler task.
    pub fn submit(&self, task: HandlerTask) {
        self.enqueue(WorkItem::Task(task));
    }

    /// Route `event` to the contexts waiting on it.
    ///
    /// `hint_supplier` extracts the routing hint; events without one are
    /// dropped. Returns the number of handler tasks queued.
    pub async fn event_map_trigger<F>(&self, event: &Event, hint_supplier: F) -> Result<usize, WorkflowError>
    where
        F: FnOnce(&Event) -> Option<String>,
    {
        let Some(hint) = hint_supplier(event) else {
            tracing::debug!(event_type = %event.event_type, "event without hint ignored");
            return Ok(0);
        };

        let mut queued = 0;
        let waiting = self.store.event_map_by_hint(&event.event_type, &hint).await?;
        for (context_name, pc) in waiting {
            let task = EventTask::builder()
                .event(event.clone())
                .event_hint(hint.clone())
                .context_name(context_name)
                .program_counter(pc)
                .build()?;
            self.submit(HandlerTask::Event(task));
            queued += 1;
        }

        let triggered = self
            .store
            .trigger_event_map_by_hint(&event.event_type, &hint)
            .await?;
        for (context_name, worklet_type) in triggered {
            let task = TriggerTask::builder()
                .event(event.clone())
                .event_hint(hint.clone())
                .context_name(context_name)
                .worklet_type(worklet_type)
                .build()?;
            self.submit(HandlerTask::Trigger(task));
            queued += 1;
        }

        if queued > 0 {
            tracing::debug!(event_type = %event.event_type, hint = %hint, queued, "routed event");
        }
        Ok(queued)
    }

    // -----------------------------------------------------------------------
    // Work queue
    // -----------------------------------------------------------------------

    /// Consume the work queue until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut receiver = self.work_rx.lock().await;
        tracing::info!("workflow engine started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = receiver.recv() => match item {
                    Some(item) => self.handle(item).await,
                    None => break,
                },
            }
        }
        tracing::info!("workflow engine stopped");
    }

    /// Handle queued work until the queue is empty. Returns the number of
    /// items handled. Timers that fire later queue new work.
    pub async fn run_until_idle(&self) -> usize {
        let mut receiver = self.work_rx.lock().await;
        let mut handled = 0;
        while let Ok(item) = receiver.try_recv() {
            self.handle(item).await;
            handled += 1;
        }
        handled
    }

    fn enqueue(&self, item: WorkItem) {
        if let Err(e) = self.work_tx.send(item) {
            tracing::error!(context = %e.0.context_name(), "work queue closed");
        }
    }

    fn schedule_task(&self, delay: Duration, task: HandlerTask) {
        tracing::debug!(
            context = %task.context_name(),
            kind = task.kind(),
            delay_ms = delay.as_millis() as u64,
            "scheduled handler task"
        );
        let sender = self.work_tx.clone();
        self.timers.schedule(delay, move || {
            let _ = sender.send(WorkItem::Task(task));
        });
    }

    async fn handle(&self, item: WorkItem) {
        let name = item.context_name().to_string();
        let mut context = match self.store.get_context(&name).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                tracing::warn!(context = %name, kind = item.kind(), "work for unknown context dropped");
                return;
            }
            Err(e) => {
                tracing::error!(context = %name, error = %e, "failed to load context");
                return;
            }
        };

        let result = match &item {
            WorkItem::Eval(_) => self.execute_eval(&mut context).await,
            WorkItem::Task(HandlerTask::Event(task)) => self.on_event(&mut context, task).await,
            WorkItem::Task(HandlerTask::EventTimeout(task)) => {
                self.on_event_timeout(&mut context, task).await
            }
            WorkItem::Task(HandlerTask::Timeout(task)) => self.on_timeout(&mut context, task).await,
            WorkItem::Task(HandlerTask::Trigger(task)) => self.on_trigger(&mut context, task).await,
        };

        let outcome = match result {
            Ok(Disposition::Commit) => self.commit(context).await,
            Ok(Disposition::Remove) => self.discard_context(context).await,
            Ok(Disposition::Skip) => Ok(()),
            Err(e) => self.fail(context, e).await,
        };
        if let Err(e) = outcome {
            tracing::error!(context = %name, error = %e, "failed to persist context");
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    async fn execute_eval(&self, context: &mut WorkflowContext) -> Result<Disposition, WorkflowError> {
        if context.state().is_terminal() || context.state() == WorkflowState::Waiting {
            tracing::debug!(context = %context.name(), state = %context.state(), "evaluation skipped");
            return Ok(Disposition::Skip);
        }

        let workflow = self.load_workflow(context.workflow_id()).await?;
        let pc = workflow.next(context, &self.registry)?;
        context.set_current(pc.clone());

        if pc.is_completed() {
            context.set_state(WorkflowState::Completed);
            context.set_trigger_next(false);
            tracing::info!(context = %context.name(), workflow = %workflow.id(), "workflow completed");
            if workflow.has_attribute(WorkflowAttribute::RemoveAfterComplete) {
                return Ok(Disposition::Remove);
            }
            return Ok(Disposition::Commit);
        }

        begin_execution(context);
        tracing::info!(context = %context.name(), worklet = %pc, "processing worklet");
        {
            let mut worklet = self.prepare_step(&workflow, &pc, context, "process")?;
            worklet.process(context)?;
            JsonDataModelInjector.inhale(&mut *worklet, context.data_mut())?;
        }
        if !self.settle(context, &pc).await? {
            context.set_current(workflow.increased(&pc)?);
        }
        Ok(Disposition::Commit)
    }

    async fn on_event(
        &self,
        context: &mut WorkflowContext,
        task: &EventTask,
    ) -> Result<Disposition, WorkflowError> {
        let pc = task.program_counter();
        let expected = is_waiting_at(context, pc)
            && context.completion_event_type() == Some(task.event_type())
            && context.completion_event_hints().contains(task.event_hint());
        if !expected {
            tracing::warn!(
                context = %context.name(),
                worklet = %pc,
                current = %context.current(),
                "stale event task ignored"
            );
            return Ok(Disposition::Skip);
        }

        let workflow = self.load_workflow(context.workflow_id()).await?;
        context.set_state(WorkflowState::Running);
        tracing::info!(context = %context.name(), worklet = %pc, event_type = %task.event_type(), "checking completion");
        let completed = {
            let mut worklet = self.prepare_step(&workflow, pc, context, "is_completed")?;
            let completed = worklet.is_completed(context, task.event())?;
            JsonDataModelInjector.inhale(&mut *worklet, context.data_mut())?;
            completed
        };

        if completed {
            self.store
                .unregister_event_map(task.event_type(), context.name())
                .await?;
            context.clear_wait();
            context.set_trigger_next(true);
            context.set_current(workflow.increased(pc)?);
            tracing::info!(context = %context.name(), worklet = %pc, "wait completed");
        } else {
            context.set_state(WorkflowState::Waiting);
            context.set_trigger_next(false);
        }
        Ok(Disposition::Commit)
    }

    async fn on_event_timeout(
        &self,
        context: &mut WorkflowContext,
        task: &EventTimeoutTask,
    ) -> Result<Disposition, WorkflowError> {
        let pc = task.program_counter();
        if !is_waiting_at(context, pc)
            || context.completion_event_type() != Some(task.event_type())
            || context.wait_seq() != task.wait_seq()
        {
            tracing::debug!(context = %context.name(), worklet = %pc, "stale event timeout ignored");
            return Ok(Disposition::Skip);
        }
        self.store
            .unregister_event_map(task.event_type(), context.name())
            .await?;
        tracing::info!(context = %context.name(), worklet = %pc, event_type = %task.event_type(), "event wait timed out");
        self.run_timeout(context, pc).await
    }

    async fn on_timeout(
        &self,
        context: &mut WorkflowContext,
        task: &TimeoutTask,
    ) -> Result<Disposition, WorkflowError> {
        let pc = task.program_counter();
        if !is_waiting_at(context, pc)
            || context.timeout().is_none()
            || context.completion_event_type().is_some()
            || context.wait_seq() != task.wait_seq()
        {
            tracing::debug!(context = %context.name(), worklet = %pc, "stale timeout ignored");
            return Ok(Disposition::Skip);
        }
        tracing::info!(context = %context.name(), worklet = %pc, "wait elapsed");
        self.run_timeout(context, pc).await
    }

    async fn on_trigger(
        &self,
        context: &mut WorkflowContext,
        task: &TriggerTask,
    ) -> Result<Disposition, WorkflowError> {
        if context.state() == WorkflowState::Running {
            tracing::debug!(context = %context.name(), "trigger ignored while running");
            return Ok(Disposition::Skip);
        }

        let valid = {
            let mut trigger = self
                .registry
                .instantiate(task.worklet_type())?
                .into_trigger("is_trigger_valid")?;
            JsonDataModelInjector.inject(&mut *trigger, context.data())?;
            trigger.is_trigger_valid(context, task.event())?
        };
        if !valid {
            tracing::debug!(context = %context.name(), trigger = %task.worklet_type(), "trigger rejected event");
            return Ok(Disposition::Skip);
        }

        if let Some(event_type) = context.completion_event_type() {
            self.store.unregister_event_map(event_type, context.name()).await?;
        }
        context.clear_wait();
        context.set_current(ProgramCounter::init());
        context.set_cause(None);
        context.set_state(WorkflowState::Idle);
        context.set_trigger_next(true);
        tracing::info!(context = %context.name(), trigger = %task.worklet_type(), "workflow restarted by trigger");
        Ok(Disposition::Commit)
    }

    async fn run_timeout(
        &self,
        context: &mut WorkflowContext,
        pc: &ProgramCounter,
    ) -> Result<Disposition, WorkflowError> {
        let workflow = self.load_workflow(context.workflow_id()).await?;
        begin_execution(context);
        {
            let mut worklet = self.prepare_step(&workflow, pc, context, "timeout")?;
            worklet.timeout(context)?;
            JsonDataModelInjector.inhale(&mut *worklet, context.data_mut())?;
        }
        if !self.settle(context, pc).await? {
            // Stay on the step; the next evaluation decides whether it runs again.
            context.set_state(WorkflowState::Idle);
            tracing::debug!(context = %context.name(), worklet = %pc, "timeout handled, re-evaluating");
        }
        Ok(Disposition::Commit)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn load_workflow(&self, workflow_id: &str) -> Result<Workflow, WorkflowError> {
        self.store
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| WorkflowError::message(format!("workflow '{workflow_id}' is not registered")))
    }

    /// Instantiate the step at `pc` and bind the context data and the
    /// step's static template onto it.
    fn prepare_step(
        &self,
        workflow: &Workflow,
        pc: &ProgramCounter,
        context: &WorkflowContext,
        operation: &str,
    ) -> Result<Box<dyn Worklet>, WorkflowError> {
        let description = workflow.worklet_description(pc).ok_or_else(|| {
            WorkflowError::InvalidProgramCounter(format!(
                "{pc} is not part of workflow '{}'",
                workflow.id()
            ))
        })?;
        let mut worklet = workflow
            .worklet_instance(pc.worklet_type(), &self.registry)?
            .into_step(operation)?;
        JsonDataModelInjector.inject(&mut *worklet, context.data())?;
        StaticDataModelInjector.inject(&mut *worklet, &description.static_data)?;
        Ok(worklet)
    }

    /// Act on the wait a worklet requested, or advance past it.
    /// Arm the wait the worklet requested, if any. Returns whether the context now waits.
    async fn settle(
        &self,
        context: &mut WorkflowContext,
        pc: &ProgramCounter,
    ) -> Result<bool, WorkflowError> {
        if let Some(event_type) = context.completion_event_type().map(str::to_string) {
            let generator = context.completion_event_generator().cloned().ok_or_else(|| {
                WorkflowError::message(format!("wait on '{event_type}' has no event generator"))
            })?;
            let hints = context.completion_event_hints().clone();
            if hints.is_empty() {
                return Err(WorkflowError::message(format!(
                    "wait on '{event_type}' has no event hints"
                )));
            }

            self.register_event_map(&event_type, &hints, context.name(), pc).await?;
            context.set_state(WorkflowState::Waiting);
            if let Some(timeout) = context.completion_event_timeout() {
                let task = EventTimeoutTask::builder()
                    .event_type(event_type.clone())
                    .event_hints(hints)
                    .context_name(context.name())
                    .program_counter(pc.clone())
                    .wait_seq(context.wait_seq())
                    .build()?;
                self.schedule_task(timeout, HandlerTask::EventTimeout(task));
            }
            tracing::info!(context = %context.name(), worklet = %pc, event_type = %event_type, "waiting for completion event");
            generator()?;
            Ok(true)
        } else if let Some(timeout) = context.timeout() {
            context.set_state(WorkflowState::Waiting);
            let task = TimeoutTask::builder()
                .context_name(context.name())
                .program_counter(pc.clone())
                .wait_seq(context.wait_seq())
                .build()?;
            self.schedule_task(timeout, HandlerTask::Timeout(task));
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Register a completion wait and poll until every hint resolves to it.
    async fn register_event_map(
        &self,
        event_type: &str,
        hints: &BTreeSet<String>,
        context_name: &str,
        pc: &ProgramCounter,
    ) -> Result<(), WorkflowError> {
        self.store
            .register_event_map(event_type, hints, context_name, pc)
            .await?;

        'hints: for hint in hints {
            for attempt in 0..self.config.register_event_map_waits {
                let map = self.store.event_map_by_hint(event_type, hint).await?;
                if map.contains_key(context_name) {
                    continue 'hints;
                }
                let backoff = self.config.register_event_map_backoff_ms * u64::from(attempt + 1);
                tracing::debug!(context = %context_name, hint = %hint, attempt, "event map not visible yet");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
            tracing::warn!(context = %context_name, event_type, hint = %hint, "event map registration not confirmed");
        }
        Ok(())
    }

    async fn register_triggers(
        &self,
        workflow: &Workflow,
        context: &mut WorkflowContext,
    ) -> Result<(), WorkflowError> {
        for trigger_type in workflow.triggers() {
            let registrations = {
                let mut trigger = self
                    .registry
                    .instantiate(trigger_type)?
                    .into_trigger("register")?;
                JsonDataModelInjector.inject(&mut *trigger, context.data())?;
                trigger.register(context)?;
                context.take_trigger_registrations()
            };
            for registration in registrations {
                self.store
                    .register_trigger_event_map(
                        &registration.event_type,
                        &registration.hints,
                        context.name(),
                        trigger_type,
                    )
                    .await?;
                tracing::debug!(
                    context = %context.name(),
                    trigger = %trigger_type,
                    event_type = %registration.event_type,
                    "registered trigger"
                );
            }
        }
        Ok(())
    }

    /// Persist `context`, flush its log, notify observers and queue the
    /// next evaluation when it should keep stepping.
    async fn commit(&self, mut context: WorkflowContext) -> Result<(), WorkflowError> {
        let name = context.name().to_string();
        for line in context.take_logs() {
            self.store.add_log(&name, &line).await?;
        }

        let state = context.state();
        let requeue = context.trigger_next() && !state.is_terminal() && state != WorkflowState::Waiting;
        if !requeue && state == WorkflowState::Running {
            context.set_state(WorkflowState::Idle);
        }

        let updated = WorkflowDataEvent::new(
            WorkflowDataEventKind::Update,
            &name,
            context.state(),
            context.current().clone(),
        );
        self.store.commit_context(context).await?;
        self.publish(updated).await;
        if requeue {
            self.enqueue(WorkItem::Eval(name));
        }
        Ok(())
    }

    /// Remove a context with its event maps and notify observers.
    async fn discard_context(&self, mut context: WorkflowContext) -> Result<(), WorkflowError> {
        let name = context.name().to_string();
        for line in context.take_logs() {
            self.store.add_log(&name, &line).await?;
        }
        if let Some(event_type) = context.completion_event_type() {
            self.store.unregister_event_map(event_type, &name).await?;
        }
        self.store.unregister_trigger_event_map(&name).await?;
        self.store.remove_context(&name).await?;
        tracing::info!(context = %name, "removed workflow context");

        self.publish(WorkflowDataEvent::new(
            WorkflowDataEventKind::Remove,
            &name,
            context.state(),
            context.current().clone(),
        ))
        .await;
        Ok(())
    }

    async fn fail(&self, mut context: WorkflowContext, error: WorkflowError) -> Result<(), WorkflowError> {
        let name = context.name().to_string();
        let cause = error.to_string();
        tracing::error!(context = %name, worklet = %context.current(), error = %cause, "workflow context failed");

        if let Some(event_type) = context.completion_event_type() {
            self.store.unregister_event_map(event_type, &name).await?;
        }
        context.clear_wait();
        context.set_cause(Some(cause.clone()));
        context.set_state(WorkflowState::Failed);
        context.set_trigger_next(false);
        self.store.add_exception(&name, &cause).await?;
        self.commit(context).await
    }

    /// Broadcast a data event, then route it so contexts can wait on
    /// other contexts (hint: the context name).
    async fn publish(&self, event: WorkflowDataEvent) {
        let routed = event.to_event();
        self.bus.publish(event);
        if let Err(e) = self
            .event_map_trigger(&routed, |event| Some(event.subject.clone()))
            .await
        {
            tracing::warn!(context = %routed.subject, error = %e, "failed to route workflow data event");
        }
    }
}

fn begin_execution(context: &mut WorkflowContext) {
    context.set_state(WorkflowState::Running);
    context.set_cause(None);
    context.clear_wait();
    context.set_trigger_next(true);
}

fn is_waiting_at(context: &WorkflowContext, pc: &ProgramCounter) -> bool {
    context.state() == WorkflowState::Waiting && context.current() == pc
}
