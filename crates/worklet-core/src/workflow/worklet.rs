//! The worklet contract.
//!
//! A worklet is one executable step of a workflow. Ordinary steps implement
//! [`Worklet`]; conditional jumps implement [`BranchWorklet`]; steps that arm
//! an external trigger implement [`TriggerWorklet`]. The reserved program
//! markers INIT, COMPLETED and INTERRUPTED are [`Sentinel`] values.
//! [`WorkletInstance`] is the sum of the four, so callers branch on the
//! variant instead of probing capabilities at runtime.

use worklet_types::error::WorkflowError;
use worklet_types::event::Event;
use worklet_types::program_counter::{COMPLETED, INIT, INTERRUPTED};

use super::binding::{FieldBinding, FieldSpec};
use super::context::WorkflowContext;

/// Declares the fields a worklet binds to the data model.
pub trait DataModelBinding {
    /// Fields bound to the context's data model tree (inject and inhale).
    fn data_model_fields(&mut self) -> Vec<FieldBinding<'_>> {
        Vec::new()
    }

    /// Fields bound to the worklet's static template (inject only).
    fn static_data_model_fields(&mut self) -> Vec<FieldBinding<'_>> {
        Vec::new()
    }
}

/// An ordinary workflow step.
pub trait Worklet: DataModelBinding + Send {
    fn tag(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Perform the step's side effects.
    fn process(&mut self, context: &mut WorkflowContext) -> Result<(), WorkflowError>;

    /// Whether this step should run next. Evaluated read-only during
    /// next-step resolution.
    fn is_next(&self, _context: &WorkflowContext) -> Result<bool, WorkflowError> {
        Ok(true)
    }

    /// Whether `event` satisfies the completion wait registered by `process`.
    fn is_completed(
        &mut self,
        _context: &mut WorkflowContext,
        _event: &Event,
    ) -> Result<bool, WorkflowError> {
        Err(WorkflowError::unsupported(self.tag(), "is_completed"))
    }

    /// Called when the registered wait elapsed without being satisfied.
    fn timeout(&mut self, _context: &mut WorkflowContext) -> Result<(), WorkflowError> {
        Err(WorkflowError::unsupported(self.tag(), "timeout"))
    }
}

/// A step that redirects execution to another step of the same program.
pub trait BranchWorklet: DataModelBinding + Send {
    fn tag(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Worklet type to continue scanning from.
    fn next(&self, context: &WorkflowContext) -> Result<String, WorkflowError>;
}

/// A step that arms an external trigger instead of running inline.
pub trait TriggerWorklet: DataModelBinding + Send {
    fn tag(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Declare the trigger events, via [`WorkflowContext::register_trigger_event`].
    fn register(&mut self, context: &mut WorkflowContext) -> Result<(), WorkflowError>;

    /// Whether `event` should restart the context.
    fn is_trigger_valid(
        &mut self,
        context: &WorkflowContext,
        event: &Event,
    ) -> Result<bool, WorkflowError>;
}

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Program counter markers. Every operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    Init,
    Completed,
    Interrupted,
}

impl Sentinel {
    pub fn from_type(worklet_type: &str) -> Option<Self> {
        match worklet_type {
            INIT => Some(Sentinel::Init),
            COMPLETED => Some(Sentinel::Completed),
            INTERRUPTED => Some(Sentinel::Interrupted),
            _ => None,
        }
    }

    pub fn worklet_type(self) -> &'static str {
        match self {
            Sentinel::Init => INIT,
            Sentinel::Completed => COMPLETED,
            Sentinel::Interrupted => INTERRUPTED,
        }
    }
}

impl DataModelBinding for Sentinel {}

impl Worklet for Sentinel {
    fn tag(&self) -> &str {
        self.worklet_type()
    }

    fn process(&mut self, _context: &mut WorkflowContext) -> Result<(), WorkflowError> {
        Err(WorkflowError::unsupported(self.tag(), "process"))
    }

    fn is_next(&self, _context: &WorkflowContext) -> Result<bool, WorkflowError> {
        Err(WorkflowError::unsupported(self.tag(), "is_next"))
    }

    fn is_completed(
        &mut self,
        _context: &mut WorkflowContext,
        _event: &Event,
    ) -> Result<bool, WorkflowError> {
        Err(WorkflowError::unsupported(self.tag(), "is_completed"))
    }

    fn timeout(&mut self, _context: &mut WorkflowContext) -> Result<(), WorkflowError> {
        Err(WorkflowError::unsupported(self.tag(), "timeout"))
    }
}

// ---------------------------------------------------------------------------
// WorkletInstance
// ---------------------------------------------------------------------------

/// A resolved worklet type.
pub enum WorkletInstance {
    Sentinel(Sentinel),
    Step(Box<dyn Worklet>),
    Branch(Box<dyn BranchWorklet>),
    Trigger(Box<dyn TriggerWorklet>),
}

impl WorkletInstance {
    pub fn tag(&self) -> &str {
        match self {
            WorkletInstance::Sentinel(sentinel) => sentinel.worklet_type(),
            WorkletInstance::Step(worklet) => worklet.tag(),
            WorkletInstance::Branch(branch) => branch.tag(),
            WorkletInstance::Trigger(trigger) => trigger.tag(),
        }
    }

    /// The ordinary step, or an error naming the operation that needed one.
    pub fn into_step(self, operation: &str) -> Result<Box<dyn Worklet>, WorkflowError> {
        match self {
            WorkletInstance::Step(worklet) => Ok(worklet),
            other => Err(WorkflowError::unsupported(other.tag(), operation)),
        }
    }

    pub fn into_trigger(self, operation: &str) -> Result<Box<dyn TriggerWorklet>, WorkflowError> {
        match self {
            WorkletInstance::Trigger(trigger) => Ok(trigger),
            other => Err(WorkflowError::unsupported(other.tag(), operation)),
        }
    }

    /// Collect this instance's field specs as `(data, static)`.
    pub fn field_specs(&mut self) -> (Vec<FieldSpec>, Vec<FieldSpec>) {
        fn specs<B: DataModelBinding + ?Sized>(binding: &mut B) -> (Vec<FieldSpec>, Vec<FieldSpec>) {
            let data = binding.data_model_fields().iter().map(FieldBinding::spec).collect();
            let statics = binding
                .static_data_model_fields()
                .iter()
                .map(FieldBinding::spec)
                .collect();
            (data, statics)
        }
        match self {
            WorkletInstance::Sentinel(_) => (Vec::new(), Vec::new()),
            WorkletInstance::Step(worklet) => specs(&mut **worklet),
            WorkletInstance::Branch(branch) => specs(&mut **branch),
            WorkletInstance::Trigger(trigger) => specs(&mut **trigger),
        }
    }
}

impl std::fmt::Debug for WorkletInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            WorkletInstance::Sentinel(_) => "Sentinel",
            WorkletInstance::Step(_) => "Step",
            WorkletInstance::Branch(_) => "Branch",
            WorkletInstance::Trigger(_) => "Trigger",
        };
        f.debug_tuple(kind).field(&self.tag()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worklet_types::data_model::JsonDataModelTree;

    #[derive(Default)]
    struct Noop;

    impl DataModelBinding for Noop {}

    impl Worklet for Noop {
        fn process(&mut self, _context: &mut WorkflowContext) -> Result<(), WorkflowError> {
            Ok(())
        }
    }

    fn ctx() -> WorkflowContext {
        WorkflowContext::new("lab", "of:wf", JsonDataModelTree::new())
    }

    #[test]
    fn sentinels_fail_every_operation() {
        let event = Event::new("X", "h", serde_json::Value::Null);
        for mut sentinel in [Sentinel::Init, Sentinel::Completed, Sentinel::Interrupted] {
            let mut context = ctx();
            assert!(matches!(
                sentinel.process(&mut context),
                Err(WorkflowError::UnsupportedOperation { .. })
            ));
            assert!(sentinel.is_next(&context).is_err());
            assert!(sentinel.is_completed(&mut context, &event).is_err());
            assert!(sentinel.timeout(&mut context).is_err());
        }
    }

    #[test]
    fn sentinel_names_are_reserved() {
        assert_eq!(Sentinel::from_type("INIT"), Some(Sentinel::Init));
        assert_eq!(Sentinel::from_type("COMPLETED"), Some(Sentinel::Completed));
        assert_eq!(Sentinel::from_type("INTERRUPTED"), Some(Sentinel::Interrupted));
        assert_eq!(Sentinel::from_type("Init"), None);
    }

    #[test]
    fn default_tag_is_type_name_and_waits_are_unsupported() {
        let mut worklet = Noop;
        assert!(worklet.tag().ends_with("Noop"));
        assert!(worklet.is_next(&ctx()).unwrap());
        assert!(matches!(
            worklet.timeout(&mut ctx()),
            Err(WorkflowError::UnsupportedOperation { operation, .. }) if operation == "timeout"
        ));
    }

    #[test]
    fn into_step_rejects_other_variants() {
        let sentinel = WorkletInstance::Sentinel(Sentinel::Completed);
        assert!(sentinel.into_step("process").is_err());
        let step = WorkletInstance::Step(Box::new(Noop));
        assert!(step.into_step("process").is_ok());
    }
}
