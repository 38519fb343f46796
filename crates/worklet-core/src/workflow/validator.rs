//! Data model checks run before a workflow is invoked.
//!
//! Walks the init worklet, the program and the triggers in order and
//! compares each worklet's field bindings with the invocation data and the
//! worklet's static template. A required path may be missing from the
//! invocation data only when an earlier worklet binds the same path (it may
//! produce it on inhale).

use std::collections::{BTreeMap, HashSet};

use worklet_types::data_model::{JsonDataModelTree, value_kind};
use worklet_types::error::WorkflowError;

use super::binding::FieldSpec;
use super::definition::Workflow;
use super::registry::WorkletRegistry;
use super::worklet::WorkletInstance;

/// Check `data` against the bindings of every worklet of `workflow`.
///
/// Returns [`WorkflowError::InvalidDataModel`] with one message per
/// offending path (static template paths are keyed `<worklet>:<path>`).
pub fn check_data_model(
    workflow: &Workflow,
    registry: &WorkletRegistry,
    data: &JsonDataModelTree,
) -> Result<(), WorkflowError> {
    let mut errors = BTreeMap::new();
    let mut produced: HashSet<String> = HashSet::new();
    let empty = JsonDataModelTree::new();

    let init = workflow.init_worklet_type().map(|t| (t, &empty));
    let program = workflow
        .program()
        .iter()
        .map(|desc| (desc.worklet_type.as_str(), &desc.static_data));
    let triggers = workflow.triggers().iter().map(|t| (t.as_str(), &empty));

    for (worklet_type, template) in init.into_iter().chain(program).chain(triggers) {
        let mut instance = match registry.instantiate(worklet_type) {
            Ok(WorkletInstance::Sentinel(_)) => continue,
            Ok(instance) => instance,
            Err(e) => {
                errors.insert(worklet_type.to_string(), e.to_string());
                continue;
            }
        };
        let (data_fields, static_fields) = instance.field_specs();

        for spec in &data_fields {
            if let Some(message) = check_field(spec, data, &produced)? {
                errors
                    .entry(spec.path.clone())
                    .or_insert_with(|| format!("{worklet_type}: {message}"));
            }
        }
        for spec in &static_fields {
            if let Some(message) = check_field(spec, template, &HashSet::new())? {
                errors.insert(
                    format!("{worklet_type}:{}", spec.path),
                    format!("static data: {message}"),
                );
            }
        }

        produced.extend(data_fields.into_iter().map(|spec| spec.path));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(workflow = %workflow.id(), errors = errors.len(), "data model check failed");
        Err(WorkflowError::InvalidDataModel {
            workflow: workflow.id().to_string(),
            errors,
        })
    }
}

fn check_field(
    spec: &FieldSpec,
    tree: &JsonDataModelTree,
    produced: &HashSet<String>,
) -> Result<Option<String>, WorkflowError> {
    let message = match tree.node_at(&spec.path)? {
        Some(node) if !spec.kind.accepts(node) => Some(format!(
            "expected {}, found {}",
            spec.kind.as_str(),
            value_kind(node)
        )),
        Some(_) => None,
        None if spec.optional || produced.contains(&spec.path) => None,
        None => Some("required path is absent".to_string()),
    };
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::binding::FieldBinding;
    use crate::workflow::context::WorkflowContext;
    use crate::workflow::worklet::{DataModelBinding, Worklet};
    use serde_json::json;
    use worklet_types::workflow::WorkletDescription;

    #[derive(Default)]
    struct Discover {
        ip: Option<String>,
        device_id: Option<String>,
    }

    impl DataModelBinding for Discover {
        fn data_model_fields(&mut self) -> Vec<FieldBinding<'_>> {
            vec![
                FieldBinding::text("/mgmtIp", &mut self.ip),
                FieldBinding::text("/deviceId", &mut self.device_id).optional(),
            ]
        }
    }

    impl Worklet for Discover {
        fn process(&mut self, _context: &mut WorkflowContext) -> Result<(), WorkflowError> {
            self.device_id = Some("of:1".to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct Configure {
        device_id: Option<String>,
        port: Option<i64>,
        vlan: Option<i64>,
    }

    impl DataModelBinding for Configure {
        fn data_model_fields(&mut self) -> Vec<FieldBinding<'_>> {
            vec![
                FieldBinding::text("/deviceId", &mut self.device_id),
                FieldBinding::integer("/port", &mut self.port),
            ]
        }

        fn static_data_model_fields(&mut self) -> Vec<FieldBinding<'_>> {
            vec![FieldBinding::integer("/vlan", &mut self.vlan)]
        }
    }

    impl Worklet for Configure {
        fn process(&mut self, _context: &mut WorkflowContext) -> Result<(), WorkflowError> {
            Ok(())
        }
    }

    fn setup() -> (Workflow, WorkletRegistry) {
        let mut registry = WorkletRegistry::new();
        registry.register::<Discover>("Discover").unwrap();
        registry.register::<Configure>("Configure").unwrap();
        let workflow = Workflow::builder()
            .id("of:wf")
            .chain("Discover")
            .chain_with(WorkletDescription::with_static_data(
                "Configure",
                JsonDataModelTree::from_value(json!({ "vlan": 100 })),
            ))
            .build()
            .unwrap();
        (workflow, registry)
    }

    #[test]
    fn accepts_data_with_paths_produced_earlier() {
        let (workflow, registry) = setup();
        let data = JsonDataModelTree::from_value(json!({ "mgmtIp": "10.0.0.1", "port": 3 }));
        check_data_model(&workflow, &registry, &data).unwrap();
    }

    #[test]
    fn reports_missing_and_mismatched_paths() {
        let (workflow, registry) = setup();
        let data = JsonDataModelTree::from_value(json!({ "port": "eth0" }));
        let err = check_data_model(&workflow, &registry, &data).unwrap_err();
        match err {
            WorkflowError::InvalidDataModel { workflow, errors } => {
                assert_eq!(workflow, "of:wf");
                assert_eq!(errors.len(), 2, "{errors:?}");
                assert!(errors["/mgmtIp"].contains("required path is absent"));
                assert!(errors["/port"].contains("expected integer, found string"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reports_static_template_problems() {
        let mut registry = WorkletRegistry::new();
        registry.register::<Configure>("Configure").unwrap();
        let workflow = Workflow::builder().id("of:wf").chain("Configure").build().unwrap();
        let data = JsonDataModelTree::from_value(json!({ "deviceId": "of:1", "port": 1 }));
        let err = check_data_model(&workflow, &registry, &data).unwrap_err();
        match err {
            WorkflowError::InvalidDataModel { errors, .. } => {
                assert!(errors.contains_key("Configure:/vlan"), "{errors:?}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
