//! Projection of data model trees onto worklet fields.
//!
//! [`JsonDataModelInjector`] binds the context's tree in both directions:
//! `inject` before a worklet runs, `inhale` afterwards to write the
//! (possibly mutated) field values back. [`StaticDataModelInjector`] binds
//! a worklet's static template and only injects.

use worklet_types::data_model::{JsonDataModelTree, value_kind};
use worklet_types::error::WorkflowError;

use super::binding::FieldBinding;
use super::worklet::DataModelBinding;

/// Request-scoped binder over the context's data model tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDataModelInjector;

impl JsonDataModelInjector {
    /// Read every bound path of `tree` into the worklet's fields.
    ///
    /// Absent optional paths are skipped; absent required paths fail with
    /// [`WorkflowError::MissingPath`]; kind mismatches always fail.
    pub fn inject<B>(&self, worklet: &mut B, tree: &JsonDataModelTree) -> Result<(), WorkflowError>
    where
        B: DataModelBinding + ?Sized,
    {
        for mut field in worklet.data_model_fields() {
            inject_field(&mut field, tree)?;
        }
        Ok(())
    }

    /// Write the worklet's field values back into `tree`.
    ///
    /// Unset fields are left alone. A set field is written where the path is
    /// absent, overwrites a node of a matching kind, and fails on a node of
    /// a conflicting kind. Writes go to a staged copy, so on error `tree` is
    /// unchanged.
    pub fn inhale<B>(&self, worklet: &mut B, tree: &mut JsonDataModelTree) -> Result<(), WorkflowError>
    where
        B: DataModelBinding + ?Sized,
    {
        let fields = worklet.data_model_fields();
        if fields.iter().all(|field| field.value().is_none()) {
            return Ok(());
        }
        let mut staged = tree.clone();
        for field in &fields {
            inhale_field(field, &mut staged)?;
        }
        *tree = staged;
        Ok(())
    }
}

/// Template-scoped binder over a worklet's static data model.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticDataModelInjector;

impl StaticDataModelInjector {
    pub fn inject<B>(&self, worklet: &mut B, template: &JsonDataModelTree) -> Result<(), WorkflowError>
    where
        B: DataModelBinding + ?Sized,
    {
        for mut field in worklet.static_data_model_fields() {
            inject_field(&mut field, template)?;
        }
        Ok(())
    }
}

fn inject_field(field: &mut FieldBinding<'_>, tree: &JsonDataModelTree) -> Result<(), WorkflowError> {
    match tree.node_at(field.path())? {
        Some(node) => field.assign(node),
        None if field.is_optional() => Ok(()),
        None => Err(WorkflowError::MissingPath(field.path().to_string())),
    }
}

fn inhale_field(field: &FieldBinding<'_>, tree: &mut JsonDataModelTree) -> Result<(), WorkflowError> {
    let Some(value) = field.value() else {
        return Ok(());
    };
    if let Some(existing) = tree.node_at(field.path())? {
        if !field.kind().accepts(existing) {
            return Err(WorkflowError::type_mismatch(
                field.path(),
                field.kind().as_str(),
                value_kind(existing),
            ));
        }
    }
    tree.set_at(field.path(), value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};

    #[derive(Default)]
    struct Configure {
        device_id: Option<String>,
        port: Option<i64>,
        enabled: Option<bool>,
        options: Option<Map<String, Value>>,
        vlan_template: Option<i64>,
    }

    impl DataModelBinding for Configure {
        fn data_model_fields(&mut self) -> Vec<FieldBinding<'_>> {
            vec![
                FieldBinding::text("/device/id", &mut self.device_id),
                FieldBinding::integer("/device/port", &mut self.port).optional(),
                FieldBinding::boolean("/device/enabled", &mut self.enabled).optional(),
                FieldBinding::object("/options", &mut self.options).optional(),
            ]
        }

        fn static_data_model_fields(&mut self) -> Vec<FieldBinding<'_>> {
            vec![FieldBinding::integer("/vlan", &mut self.vlan_template)]
        }
    }

    #[test]
    fn inject_required_absent_path_fails() {
        let tree = JsonDataModelTree::from_value(json!({ "device": {} }));
        let mut worklet = Configure::default();
        let err = JsonDataModelInjector.inject(&mut worklet, &tree).unwrap_err();
        assert!(matches!(err, WorkflowError::MissingPath(path) if path == "/device/id"));
    }

    #[test]
    fn inject_optional_absent_path_keeps_default() {
        let tree = JsonDataModelTree::from_value(json!({ "device": { "id": "of:1" } }));
        let mut worklet = Configure {
            port: Some(22),
            ..Default::default()
        };
        JsonDataModelInjector.inject(&mut worklet, &tree).unwrap();
        assert_eq!(worklet.device_id.as_deref(), Some("of:1"));
        assert_eq!(worklet.port, Some(22));
        assert_eq!(worklet.enabled, None);
    }

    #[test]
    fn inject_kind_mismatch_fails_even_when_optional() {
        let tree = JsonDataModelTree::from_value(json!({
            "device": { "id": "of:1", "port": "eth0" }
        }));
        let mut worklet = Configure::default();
        let err = JsonDataModelInjector.inject(&mut worklet, &tree).unwrap_err();
        assert!(matches!(err, WorkflowError::TypeMismatch { path, .. } if path == "/device/port"));
    }

    #[test]
    fn inject_mutate_inhale_round_trip() {
        let mut tree = JsonDataModelTree::from_value(json!({
            "device": { "id": "of:1", "port": 1 }
        }));
        let mut worklet = Configure::default();
        JsonDataModelInjector.inject(&mut worklet, &tree).unwrap();

        worklet.port = Some(2);
        worklet.enabled = Some(true);
        let mut options = Map::new();
        options.insert("mtu".to_string(), json!(9000));
        worklet.options = Some(options);
        JsonDataModelInjector.inhale(&mut worklet, &mut tree).unwrap();

        assert_eq!(tree.int_at("/device/port").unwrap(), Some(2));
        assert_eq!(tree.boolean_at("/device/enabled").unwrap(), Some(true));
        assert_eq!(tree.int_at("/options/mtu").unwrap(), Some(9000));
        assert_eq!(tree.text_at("/device/id").unwrap().as_deref(), Some("of:1"));
    }

    #[test]
    fn inhale_conflicting_kind_fails() {
        let mut tree = JsonDataModelTree::from_value(json!({
            "device": { "id": "of:1" },
            "options": [1, 2]
        }));
        let mut worklet = Configure {
            device_id: Some("of:1".to_string()),
            options: Some(Map::new()),
            ..Default::default()
        };
        let err = JsonDataModelInjector.inhale(&mut worklet, &mut tree).unwrap_err();
        assert!(matches!(err, WorkflowError::TypeMismatch { path, .. } if path == "/options"));
    }

    #[test]
    fn failed_inhale_leaves_tree_untouched() {
        let original = json!({
            "device": { "id": "of:1", "port": 1 },
            "options": [1, 2]
        });
        let mut tree = JsonDataModelTree::from_value(original.clone());
        let mut worklet = Configure {
            device_id: Some("of:2".to_string()),
            port: Some(8),
            enabled: Some(false),
            options: Some(Map::new()),
            ..Default::default()
        };
        JsonDataModelInjector.inhale(&mut worklet, &mut tree).unwrap_err();
        assert_eq!(tree.root(), &original);
    }

    #[test]
    fn static_injector_reads_template_only() {
        let template = JsonDataModelTree::from_value(json!({ "vlan": 100 }));
        let mut worklet = Configure::default();
        StaticDataModelInjector.inject(&mut worklet, &template).unwrap();
        assert_eq!(worklet.vlan_template, Some(100));
        assert_eq!(worklet.device_id, None);

        let err = StaticDataModelInjector
            .inject(&mut worklet, &JsonDataModelTree::new())
            .unwrap_err();
        assert!(matches!(err, WorkflowError::MissingPath(path) if path == "/vlan"));
    }
}
