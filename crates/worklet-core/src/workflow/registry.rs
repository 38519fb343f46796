//! Name-keyed worklet factories, populated once at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use worklet_types::error::WorkflowError;

use super::worklet::{BranchWorklet, Sentinel, TriggerWorklet, Worklet, WorkletInstance};

type StepFactory = Arc<dyn Fn() -> Box<dyn Worklet> + Send + Sync>;
type BranchFactory = Arc<dyn Fn() -> Box<dyn BranchWorklet> + Send + Sync>;
type TriggerFactory = Arc<dyn Fn() -> Box<dyn TriggerWorklet> + Send + Sync>;

#[derive(Clone)]
enum Factory {
    Step(StepFactory),
    Branch(BranchFactory),
    Trigger(TriggerFactory),
}

/// Resolves worklet type names to fresh instances.
///
/// Sentinel names (INIT, COMPLETED, INTERRUPTED) resolve without
/// registration and cannot be registered.
#[derive(Clone, Default)]
pub struct WorkletRegistry {
    factories: HashMap<String, Factory>,
}

impl WorkletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ordinary worklet constructed with `Default`.
    pub fn register<W>(&mut self, worklet_type: impl Into<String>) -> Result<(), WorkflowError>
    where
        W: Worklet + Default + 'static,
    {
        self.register_with(worklet_type, || Box::new(W::default()) as Box<dyn Worklet>)
    }

    /// Register an ordinary worklet with a custom factory.
    pub fn register_with<F>(
        &mut self,
        worklet_type: impl Into<String>,
        factory: F,
    ) -> Result<(), WorkflowError>
    where
        F: Fn() -> Box<dyn Worklet> + Send + Sync + 'static,
    {
        self.insert(worklet_type.into(), Factory::Step(Arc::new(factory)))
    }

    pub fn register_branch<B>(&mut self, worklet_type: impl Into<String>) -> Result<(), WorkflowError>
    where
        B: BranchWorklet + Default + 'static,
    {
        let factory: BranchFactory = Arc::new(|| Box::new(B::default()) as Box<dyn BranchWorklet>);
        self.insert(worklet_type.into(), Factory::Branch(factory))
    }

    pub fn register_trigger<T>(&mut self, worklet_type: impl Into<String>) -> Result<(), WorkflowError>
    where
        T: TriggerWorklet + Default + 'static,
    {
        let factory: TriggerFactory =
            Arc::new(|| Box::new(T::default()) as Box<dyn TriggerWorklet>);
        self.insert(worklet_type.into(), Factory::Trigger(factory))
    }

    /// Remove a registration. Returns `true` if it existed.
    pub fn unregister(&mut self, worklet_type: &str) -> bool {
        self.factories.remove(worklet_type).is_some()
    }

    pub fn contains(&self, worklet_type: &str) -> bool {
        Sentinel::from_type(worklet_type).is_some() || self.factories.contains_key(worklet_type)
    }

    /// Registered type names, sorted.
    pub fn worklet_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build a fresh instance of `worklet_type`.
    pub fn instantiate(&self, worklet_type: &str) -> Result<WorkletInstance, WorkflowError> {
        if let Some(sentinel) = Sentinel::from_type(worklet_type) {
            return Ok(WorkletInstance::Sentinel(sentinel));
        }
        match self.factories.get(worklet_type) {
            Some(Factory::Step(factory)) => Ok(WorkletInstance::Step(factory())),
            Some(Factory::Branch(factory)) => Ok(WorkletInstance::Branch(factory())),
            Some(Factory::Trigger(factory)) => Ok(WorkletInstance::Trigger(factory())),
            None => Err(WorkflowError::UnknownWorklet(worklet_type.to_string())),
        }
    }

    fn insert(&mut self, worklet_type: String, factory: Factory) -> Result<(), WorkflowError> {
        if worklet_type.is_empty() {
            return Err(WorkflowError::message("worklet type must not be empty"));
        }
        if Sentinel::from_type(&worklet_type).is_some() {
            return Err(WorkflowError::message(format!(
                "worklet type '{worklet_type}' is reserved"
            )));
        }
        if self.factories.contains_key(&worklet_type) {
            return Err(WorkflowError::message(format!(
                "worklet type '{worklet_type}' is already registered"
            )));
        }
        tracing::debug!(worklet = %worklet_type, "registered worklet");
        self.factories.insert(worklet_type, factory);
        Ok(())
    }
}

impl fmt::Debug for WorkletRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkletRegistry")
            .field("worklet_types", &self.worklet_types())
            .finish()
    }
}
