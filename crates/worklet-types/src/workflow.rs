//! Workflow domain types: lifecycle state, attributes, worklet descriptions,
//! workplaces and the JSON descriptions accepted from the outside world.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data_model::JsonDataModelTree;
use crate::error::WorkflowError;

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Lifecycle state of a workflow context.
///
/// `Completed` and `Failed` are terminal; the others are driven by the
/// execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    Running,
    Waiting,
    Completed,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Running => "running",
            WorkflowState::Waiting => "waiting",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorkflowAttribute
// ---------------------------------------------------------------------------

/// Optional behaviors attached to a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowAttribute {
    /// Drop the context from the workplace store once it reaches COMPLETED.
    RemoveAfterComplete,
}

impl FromStr for WorkflowAttribute {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REMOVE_AFTER_COMPLETE" => Ok(WorkflowAttribute::RemoveAfterComplete),
            other => Err(WorkflowError::message(format!(
                "unknown workflow attribute '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkletDescription
// ---------------------------------------------------------------------------

/// One entry of a workflow program: the worklet type name plus the static
/// data model template fixed at definition time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkletDescription {
    pub worklet_type: String,
    #[serde(default)]
    pub static_data: JsonDataModelTree,
}

impl WorkletDescription {
    pub fn new(worklet_type: impl Into<String>) -> Self {
        Self {
            worklet_type: worklet_type.into(),
            static_data: JsonDataModelTree::new(),
        }
    }

    pub fn with_static_data(worklet_type: impl Into<String>, static_data: JsonDataModelTree) -> Self {
        Self {
            worklet_type: worklet_type.into(),
            static_data,
        }
    }
}

// ---------------------------------------------------------------------------
// Workplace
// ---------------------------------------------------------------------------

/// Named container owning workflow contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workplace {
    pub name: String,
    #[serde(default)]
    pub data: JsonDataModelTree,
}

impl Workplace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: JsonDataModelTree::new(),
        }
    }
}

/// Name of the context for `workflow_id` running in `workplace`.
pub fn context_name(workplace: &str, workflow_id: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{workplace}:{workflow_id}:{suffix}"),
        None => format!("{workplace}:{workflow_id}"),
    }
}

// ---------------------------------------------------------------------------
// Descriptions
// ---------------------------------------------------------------------------

/// `{workplace: string, id: URI-string, data: object}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDescription {
    pub workplace: String,
    pub id: String,
    pub data: JsonDataModelTree,
}

impl WorkflowDescription {
    pub fn new(
        workplace: impl Into<String>,
        id: impl Into<String>,
        data: Value,
    ) -> Result<Self, WorkflowError> {
        let mut object = Map::new();
        object.insert("workplace".to_string(), Value::String(workplace.into()));
        object.insert("id".to_string(), Value::String(id.into()));
        object.insert("data".to_string(), data);
        Self::from_json(&Value::Object(object))
    }

    pub fn from_json(value: &Value) -> Result<Self, WorkflowError> {
        let object = as_object(value, "workflow description")?;
        let workplace = required_text(object, "workplace", "workflow description")?;
        let id = required_text(object, "id", "workflow description")?;
        if !looks_like_uri(&id) {
            return Err(WorkflowError::message(format!(
                "workflow description: id '{id}' is not a URI"
            )));
        }
        let data = match object.get("data") {
            Some(data @ Value::Object(_)) => JsonDataModelTree::from_value(data.clone()),
            Some(_) => {
                return Err(WorkflowError::message(
                    "workflow description: 'data' must be an object",
                ));
            }
            None => {
                return Err(WorkflowError::message(
                    "workflow description: missing 'data'",
                ));
            }
        };
        Ok(Self {
            workplace,
            id,
            data,
        })
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "workplace": self.workplace,
            "id": self.id,
            "data": self.data.root(),
        })
    }

    pub fn workflow_context_name(&self) -> String {
        context_name(&self.workplace, &self.id, None)
    }
}

/// `{name: string, data?: object|array}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkplaceDescription {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonDataModelTree>,
}

impl WorkplaceDescription {
    pub fn from_json(value: &Value) -> Result<Self, WorkflowError> {
        let object = as_object(value, "workplace description")?;
        let name = required_text(object, "name", "workplace description")?;
        let data = match object.get("data") {
            None | Some(Value::Null) => None,
            Some(data @ (Value::Object(_) | Value::Array(_))) => {
                Some(JsonDataModelTree::from_value(data.clone()))
            }
            Some(_) => {
                return Err(WorkflowError::message(
                    "workplace description: 'data' must be an object or array",
                ));
            }
        };
        Ok(Self { name, data })
    }

    pub fn into_workplace(self) -> Workplace {
        Workplace {
            name: self.name,
            data: self.data.unwrap_or_default(),
        }
    }
}

/// `{op: string, params: any, id: string}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcDescription {
    pub op: String,
    pub params: Value,
    pub id: String,
}

impl RpcDescription {
    pub fn from_json(value: &Value) -> Result<Self, WorkflowError> {
        let object = as_object(value, "rpc description")?;
        let op = required_text(object, "op", "rpc description")?;
        let id = required_text(object, "id", "rpc description")?;
        let params = object
            .get("params")
            .cloned()
            .ok_or_else(|| WorkflowError::message("rpc description: missing 'params'"))?;
        Ok(Self { op, params, id })
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, WorkflowError> {
    value
        .as_object()
        .ok_or_else(|| WorkflowError::message(format!("{what} must be a JSON object")))
}

fn required_text(
    object: &Map<String, Value>,
    field: &str,
    what: &str,
) -> Result<String, WorkflowError> {
    match object.get(field) {
        Some(Value::String(text)) if !text.is_empty() => Ok(text.clone()),
        Some(Value::String(_)) => Err(WorkflowError::message(format!(
            "{what}: '{field}' must not be empty"
        ))),
        Some(_) => Err(WorkflowError::message(format!(
            "{what}: '{field}' must be a string"
        ))),
        None => Err(WorkflowError::message(format!("{what}: missing '{field}'"))),
    }
}

/// `scheme:rest`, where the scheme starts with a letter and contains only
/// letters, digits, `+`, `-` and `.`.
fn looks_like_uri(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
}
