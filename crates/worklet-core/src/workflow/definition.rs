//! Immutable workflow programs and next-step resolution.
//!
//! A [`Workflow`] is an ordered list of worklet types that always starts
//! with INIT and ends with COMPLETED. [`Workflow::next`] scans forward from
//! the context's program counter, following branch jumps and evaluating
//! `is_next` on ordinary steps, bounded by [`MAX_WORKS`].

use std::collections::BTreeSet;

use worklet_types::error::WorkflowError;
use worklet_types::program_counter::{COMPLETED, INIT, ProgramCounter};
use worklet_types::workflow::{WorkflowAttribute, WorkletDescription};

use super::context::WorkflowContext;
use super::injector::JsonDataModelInjector;
use super::registry::WorkletRegistry;
use super::worklet::{Sentinel, WorkletInstance};

/// Ceiling on worklets scanned by a single [`Workflow::next`] call.
pub const MAX_WORKS: usize = 1000;

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    id: String,
    init_worklet_type: Option<String>,
    program: Vec<WorkletDescription>,
    attributes: BTreeSet<WorkflowAttribute>,
    triggers: Vec<String>,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Worklet run once, when a context is invoked, before the program starts.
    pub fn init_worklet_type(&self) -> Option<&str> {
        self.init_worklet_type.as_deref()
    }

    /// The full program, including the INIT and COMPLETED markers.
    pub fn program(&self) -> &[WorkletDescription] {
        &self.program
    }

    pub fn attributes(&self) -> &BTreeSet<WorkflowAttribute> {
        &self.attributes
    }

    pub fn has_attribute(&self, attribute: WorkflowAttribute) -> bool {
        self.attributes.contains(&attribute)
    }

    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    /// Index of the first program entry of `worklet_type`.
    pub fn index_of(&self, worklet_type: &str) -> Option<usize> {
        self.program
            .iter()
            .position(|desc| desc.worklet_type == worklet_type)
    }

    /// Description of the entry `pc` points at, if `pc` matches the program.
    pub fn worklet_description(&self, pc: &ProgramCounter) -> Option<&WorkletDescription> {
        self.program
            .get(pc.worklet_index())
            .filter(|desc| desc.worklet_type == pc.worklet_type())
    }

    pub fn worklet_instance(
        &self,
        worklet_type: &str,
        registry: &WorkletRegistry,
    ) -> Result<WorkletInstance, WorkflowError> {
        registry.instantiate(worklet_type)
    }

    /// The counter of the entry after `pc`.
    pub fn increased(&self, pc: &ProgramCounter) -> Result<ProgramCounter, WorkflowError> {
        let index = pc.worklet_index() + 1;
        match self.program.get(index) {
            Some(desc) => Ok(ProgramCounter::new(desc.worklet_type.clone(), index)),
            None => Err(WorkflowError::ProgramCounterOutOfBounds {
                pc: pc.to_string(),
                len: self.program.len(),
            }),
        }
    }

    /// Resolve the next runnable program counter for `context`.
    pub fn next(
        &self,
        context: &WorkflowContext,
        registry: &WorkletRegistry,
    ) -> Result<ProgramCounter, WorkflowError> {
        let injector = JsonDataModelInjector;
        let mut index = context.current().worklet_index();
        let mut scanned = 0usize;

        while let Some(desc) = self.program.get(index) {
            scanned += 1;
            if scanned > MAX_WORKS {
                return Err(WorkflowError::RunawayWorkflow {
                    workflow_id: self.id.clone(),
                    max: MAX_WORKS,
                });
            }

            let pc = ProgramCounter::new(desc.worklet_type.clone(), index);
            match self.worklet_instance(&desc.worklet_type, registry)? {
                WorkletInstance::Sentinel(Sentinel::Completed) => return Ok(pc),
                WorkletInstance::Sentinel(Sentinel::Init) => index += 1,
                WorkletInstance::Sentinel(Sentinel::Interrupted) => {
                    return Err(WorkflowError::unsupported(pc.worklet_type(), "next"));
                }
                WorkletInstance::Branch(mut branch) => {
                    injector.inject(&mut *branch, context.data())?;
                    let target = branch.next(context)?;
                    index = self.index_of(&target).ok_or_else(|| {
                        WorkflowError::message(format!(
                            "branch {pc} of workflow '{}' targets unknown worklet '{target}'",
                            self.id
                        ))
                    })?;
                    tracing::trace!(workflow = %self.id, branch = %pc, target = %target, "branch jump");
                }
                WorkletInstance::Step(mut worklet) => {
                    injector.inject(&mut *worklet, context.data())?;
                    if worklet.is_next(context)? {
                        return Ok(pc);
                    }
                    index += 1;
                }
                WorkletInstance::Trigger(trigger) => {
                    return Err(WorkflowError::unsupported(trigger.tag(), "next"));
                }
            }
        }

        Err(WorkflowError::ReachedEndNotCompleted(self.id.clone()))
    }

    /// Check every referenced worklet type against `registry`.
    pub fn validate(&self, registry: &WorkletRegistry) -> Result<(), WorkflowError> {
        let mut errors = Vec::new();
        let last = self.program.len().saturating_sub(1);

        for (index, desc) in self.program.iter().enumerate() {
            match Sentinel::from_type(&desc.worklet_type) {
                Some(Sentinel::Init) if index == 0 => {}
                Some(Sentinel::Completed) if index == last => {}
                Some(sentinel) => errors.push(format!(
                    "({index}) reserved worklet type '{}' is not allowed here",
                    sentinel.worklet_type()
                )),
                None => match registry.instantiate(&desc.worklet_type) {
                    Ok(WorkletInstance::Trigger(_)) => errors.push(format!(
                        "({index}) trigger worklet '{}' cannot be part of the program",
                        desc.worklet_type
                    )),
                    Ok(_) => {}
                    Err(e) => errors.push(format!("({index}) {e}")),
                },
            }
        }

        if let Some(init) = &self.init_worklet_type {
            match registry.instantiate(init) {
                Ok(WorkletInstance::Step(_)) => {}
                Ok(_) => errors.push(format!("init worklet '{init}' must be an ordinary worklet")),
                Err(e) => errors.push(format!("init worklet: {e}")),
            }
        }

        for trigger in &self.triggers {
            match registry.instantiate(trigger) {
                Ok(WorkletInstance::Trigger(_)) => {}
                Ok(_) => errors.push(format!("'{trigger}' is not a trigger worklet")),
                Err(e) => errors.push(format!("trigger: {e}")),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::InvalidDefinition {
                workflow_id: self.id.clone(),
                errors,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    id: Option<String>,
    init_worklet_type: Option<String>,
    program: Vec<WorkletDescription>,
    attributes: BTreeSet<WorkflowAttribute>,
    triggers: Vec<String>,
}

impl WorkflowBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn init(mut self, worklet_type: impl Into<String>) -> Self {
        self.init_worklet_type = Some(worklet_type.into());
        self
    }

    /// Append a worklet with an empty static template.
    pub fn chain(self, worklet_type: impl Into<String>) -> Self {
        self.chain_with(WorkletDescription::new(worklet_type))
    }

    pub fn chain_with(mut self, description: WorkletDescription) -> Self {
        self.program.push(description);
        self
    }

    pub fn attribute(mut self, attribute: WorkflowAttribute) -> Self {
        self.attributes.insert(attribute);
        self
    }

    pub fn trigger(mut self, worklet_type: impl Into<String>) -> Self {
        self.triggers.push(worklet_type.into());
        self
    }

    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or(WorkflowError::MissingField {
                builder: "Workflow",
                field: "id",
            })?;

        let mut program = Vec::with_capacity(self.program.len() + 2);
        program.push(WorkletDescription::new(INIT));
        program.extend(self.program);
        program.push(WorkletDescription::new(COMPLETED));

        Ok(Workflow {
            id,
            init_worklet_type: self.init_worklet_type,
            program,
            attributes: self.attributes,
            triggers: self.triggers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::binding::FieldBinding;
    use crate::workflow::worklet::{BranchWorklet, DataModelBinding, TriggerWorklet, Worklet};
    use serde_json::json;
    use worklet_types::data_model::JsonDataModelTree;
    use worklet_types::event::Event;

    /// Ordinary step whose `is_next` reads `/<name>/ready`.
    struct Flagged {
        path: &'static str,
        ready: Option<bool>,
    }

    impl DataModelBinding for Flagged {
        fn data_model_fields(&mut self) -> Vec<FieldBinding<'_>> {
            vec![FieldBinding::boolean(self.path, &mut self.ready).optional()]
        }
    }

    impl Worklet for Flagged {
        fn process(&mut self, _context: &mut WorkflowContext) -> Result<(), WorkflowError> {
            Ok(())
        }

        fn is_next(&self, _context: &WorkflowContext) -> Result<bool, WorkflowError> {
            Ok(self.ready.unwrap_or(false))
        }
    }

    #[derive(Default)]
    struct JumpToB;
    impl DataModelBinding for JumpToB {}
    impl BranchWorklet for JumpToB {
        fn next(&self, _context: &WorkflowContext) -> Result<String, WorkflowError> {
            Ok("B".to_string())
        }
    }

    #[derive(Default)]
    struct Loop;
    impl DataModelBinding for Loop {}
    impl BranchWorklet for Loop {
        fn next(&self, _context: &WorkflowContext) -> Result<String, WorkflowError> {
            Ok("Loop".to_string())
        }
    }

    #[derive(Default)]
    struct OnRestart;
    impl DataModelBinding for OnRestart {}
    impl TriggerWorklet for OnRestart {
        fn register(&mut self, context: &mut WorkflowContext) -> Result<(), WorkflowError> {
            context.register_trigger_event("DeviceEvent", ["of:1".to_string()]);
            Ok(())
        }

        fn is_trigger_valid(
            &mut self,
            _context: &WorkflowContext,
            _event: &Event,
        ) -> Result<bool, WorkflowError> {
            Ok(true)
        }
    }

    fn registry() -> WorkletRegistry {
        let mut registry = WorkletRegistry::new();
        registry
            .register_with("A", || {
                Box::new(Flagged { path: "/a/ready", ready: None }) as Box<dyn Worklet>
            })
            .unwrap();
        registry
            .register_with("B", || {
                Box::new(Flagged { path: "/b/ready", ready: None }) as Box<dyn Worklet>
            })
            .unwrap();
        registry.register_branch::<JumpToB>("JumpToB").unwrap();
        registry.register_branch::<Loop>("Loop").unwrap();
        registry.register_trigger::<OnRestart>("OnRestart").unwrap();
        registry
    }

    fn context(data: serde_json::Value) -> WorkflowContext {
        WorkflowContext::new("lab", "of:wf", JsonDataModelTree::from_value(data))
    }

    #[test]
    fn builder_wraps_program_in_sentinels() {
        let workflow = Workflow::builder().id("of:wf").chain("A").chain("B").build().unwrap();
        let types: Vec<&str> = workflow
            .program()
            .iter()
            .map(|d| d.worklet_type.as_str())
            .collect();
        assert_eq!(types, vec!["INIT", "A", "B", "COMPLETED"]);
    }

    #[test]
    fn builder_requires_id() {
        let err = Workflow::builder().chain("A").build().unwrap_err();
        assert!(matches!(err, WorkflowError::MissingField { field: "id", .. }));
    }

    #[test]
    fn next_skips_steps_that_are_not_next() {
        let workflow = Workflow::builder().id("of:wf").chain("A").chain("B").build().unwrap();
        let ctx = context(json!({ "a": { "ready": false }, "b": { "ready": true } }));
        let pc = workflow.next(&ctx, &registry()).unwrap();
        assert_eq!(pc, ProgramCounter::new("B", 2));
    }

    #[test]
    fn next_returns_completed_when_nothing_runs() {
        let workflow = Workflow::builder().id("of:wf").chain("A").chain("B").build().unwrap();
        let pc = workflow.next(&context(json!({})), &registry()).unwrap();
        assert_eq!(pc, ProgramCounter::new("COMPLETED", 3));
    }

    #[test]
    fn branch_jumps_over_intermediate_steps() {
        let workflow = Workflow::builder()
            .id("of:wf")
            .chain("JumpToB")
            .chain("A")
            .chain("B")
            .build()
            .unwrap();
        // A would run if reached; the branch must skip it.
        let ctx = context(json!({ "a": { "ready": true }, "b": { "ready": true } }));
        let pc = workflow.next(&ctx, &registry()).unwrap();
        assert_eq!(pc, ProgramCounter::new("B", 3));
    }

    #[test]
    fn branch_cycle_is_a_runaway_workflow() {
        let workflow = Workflow::builder().id("of:wf").chain("Loop").build().unwrap();
        let err = workflow.next(&context(json!({})), &registry()).unwrap_err();
        assert!(matches!(err, WorkflowError::RunawayWorkflow { max: MAX_WORKS, .. }));
    }

    #[test]
    fn trigger_in_the_program_cannot_be_scheduled() {
        // A is skipped, so the scan walks onto the trigger entry.
        let workflow = Workflow::builder()
            .id("of:wf")
            .chain("A")
            .chain("OnRestart")
            .chain("B")
            .build()
            .unwrap();
        let ctx = context(json!({ "a": { "ready": false }, "b": { "ready": true } }));
        let err = workflow.next(&ctx, &registry()).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::UnsupportedOperation { ref operation, .. } if operation == "next"
        ));
    }

    #[test]
    fn increased_moves_one_step_and_stops_at_the_end() {
        let workflow = Workflow::builder().id("of:wf").chain("A").build().unwrap();
        let pc = workflow.increased(&ProgramCounter::init()).unwrap();
        assert_eq!(pc, ProgramCounter::new("A", 1));
        let pc = workflow.increased(&pc).unwrap();
        assert_eq!(pc, ProgramCounter::new("COMPLETED", 2));
        assert!(matches!(
            workflow.increased(&pc),
            Err(WorkflowError::ProgramCounterOutOfBounds { len: 3, .. })
        ));
    }

    #[test]
    fn worklet_description_checks_type() {
        let workflow = Workflow::builder().id("of:wf").chain("A").build().unwrap();
        assert!(workflow.worklet_description(&ProgramCounter::new("A", 1)).is_some());
        assert!(workflow.worklet_description(&ProgramCounter::new("B", 1)).is_none());
        assert_eq!(workflow.index_of("COMPLETED"), Some(2));
    }

    #[test]
    fn validate_reports_every_problem() {
        let workflow = Workflow::builder()
            .id("of:wf")
            .chain("A")
            .chain("Missing")
            .chain("COMPLETED")
            .trigger("A")
            .build()
            .unwrap();
        let err = workflow.validate(&registry()).unwrap_err();
        match err {
            WorkflowError::InvalidDefinition { workflow_id, errors } => {
                assert_eq!(workflow_id, "of:wf");
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("Missing")));
                assert!(errors.iter().any(|e| e.contains("reserved")));
                assert!(errors.iter().any(|e| e.contains("not a trigger")));
            }
            other => panic!("unexpected error: {other}"),
        }

        let ok = Workflow::builder().id("of:wf").chain("A").chain("JumpToB").build().unwrap();
        assert!(ok.validate(&registry()).is_ok());
    }
}
