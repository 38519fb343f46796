//! Field binding descriptors.
//!
//! A worklet lists its bound fields by returning [`FieldBinding`]s from
//! [`DataModelBinding`](super::worklet::DataModelBinding). Each binding
//! pairs a JSON pointer and an optional flag with a mutable reference to
//! the field, so injection and inhalation need no runtime reflection.

use serde_json::{Map, Value};
use worklet_types::data_model::value_kind;
use worklet_types::error::WorkflowError;

/// The kind of value a bound field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    Node,
    Array,
    Object,
}

impl FieldKind {
    /// Whether a tree node of this shape can be read into (or replaced by) the field.
    pub fn accepts(self, node: &Value) -> bool {
        match self {
            FieldKind::Text => node.is_string(),
            FieldKind::Integer => node.is_i64() || node.is_u64(),
            FieldKind::Boolean => node.is_boolean(),
            FieldKind::Node => true,
            FieldKind::Array => node.is_array(),
            FieldKind::Object => node.is_object(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Node => "node",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

/// Mutable reference to a bound field, one variant per supported kind.
#[derive(Debug)]
pub enum FieldTarget<'a> {
    Text(&'a mut Option<String>),
    Integer(&'a mut Option<i64>),
    Boolean(&'a mut Option<bool>),
    Node(&'a mut Option<Value>),
    Array(&'a mut Option<Vec<Value>>),
    Object(&'a mut Option<Map<String, Value>>),
}

/// Static description of a binding, detached from the worklet instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub path: String,
    pub kind: FieldKind,
    pub optional: bool,
}

#[derive(Debug)]
pub struct FieldBinding<'a> {
    path: String,
    optional: bool,
    target: FieldTarget<'a>,
}

impl<'a> FieldBinding<'a> {
    pub fn new(path: impl Into<String>, target: FieldTarget<'a>) -> Self {
        Self {
            path: path.into(),
            optional: false,
            target,
        }
    }

    pub fn text(path: impl Into<String>, field: &'a mut Option<String>) -> Self {
        Self::new(path, FieldTarget::Text(field))
    }

    pub fn integer(path: impl Into<String>, field: &'a mut Option<i64>) -> Self {
        Self::new(path, FieldTarget::Integer(field))
    }

    pub fn boolean(path: impl Into<String>, field: &'a mut Option<bool>) -> Self {
        Self::new(path, FieldTarget::Boolean(field))
    }

    pub fn node(path: impl Into<String>, field: &'a mut Option<Value>) -> Self {
        Self::new(path, FieldTarget::Node(field))
    }

    pub fn array(path: impl Into<String>, field: &'a mut Option<Vec<Value>>) -> Self {
        Self::new(path, FieldTarget::Array(field))
    }

    pub fn object(path: impl Into<String>, field: &'a mut Option<Map<String, Value>>) -> Self {
        Self::new(path, FieldTarget::Object(field))
    }

    /// Mark the binding optional: an absent path leaves the field untouched.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn kind(&self) -> FieldKind {
        match self.target {
            FieldTarget::Text(_) => FieldKind::Text,
            FieldTarget::Integer(_) => FieldKind::Integer,
            FieldTarget::Boolean(_) => FieldKind::Boolean,
            FieldTarget::Node(_) => FieldKind::Node,
            FieldTarget::Array(_) => FieldKind::Array,
            FieldTarget::Object(_) => FieldKind::Object,
        }
    }

    pub fn spec(&self) -> FieldSpec {
        FieldSpec {
            path: self.path.clone(),
            kind: self.kind(),
            optional: self.optional,
        }
    }

    /// Read `node` into the field.
    pub fn assign(&mut self, node: &Value) -> Result<(), WorkflowError> {
        let path = self.path.clone();
        let kind = self.kind();
        let mismatch = || WorkflowError::type_mismatch(&path, kind.as_str(), value_kind(node));
        match &mut self.target {
            FieldTarget::Text(field) => {
                let text = node.as_str().ok_or_else(mismatch)?;
                **field = Some(text.to_string());
            }
            FieldTarget::Integer(field) => {
                let number = node.as_i64().ok_or_else(mismatch)?;
                **field = Some(number);
            }
            FieldTarget::Boolean(field) => {
                let flag = node.as_bool().ok_or_else(mismatch)?;
                **field = Some(flag);
            }
            FieldTarget::Node(field) => {
                **field = Some(node.clone());
            }
            FieldTarget::Array(field) => {
                let items = node.as_array().ok_or_else(mismatch)?;
                **field = Some(items.clone());
            }
            FieldTarget::Object(field) => {
                let map = node.as_object().ok_or_else(mismatch)?;
                **field = Some(map.clone());
            }
        }
        Ok(())
    }

    /// The field's current value as a tree node, `None` when unset.
    pub fn value(&self) -> Option<Value> {
        match &self.target {
            FieldTarget::Text(field) => field.as_ref().map(|t| Value::String(t.clone())),
            FieldTarget::Integer(field) => field.map(Value::from),
            FieldTarget::Boolean(field) => field.map(Value::Bool),
            FieldTarget::Node(field) => field.as_ref().cloned(),
            FieldTarget::Array(field) => field.as_ref().map(|items| Value::Array(items.clone())),
            FieldTarget::Object(field) => field.as_ref().map(|map| Value::Object(map.clone())),
        }
    }
}
