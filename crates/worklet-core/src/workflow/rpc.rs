//! JSON RPC dispatch onto the engine.
//!
//! An RPC is `{op, params, id}`. Supported operations:
//!
//! | op | params | result |
//! |---|---|---|
//! | `workplace.create` | workplace description | `null` |
//! | `workplace.remove` | workplace description | `true` if it existed |
//! | `workflow.invoke` | workflow description | the new context name |

use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};
use worklet_types::error::WorkflowError;
use worklet_types::workflow::{RpcDescription, WorkflowDescription, WorkplaceDescription};

use crate::repository::EngineStore;

use super::engine::WorkflowEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcOp {
    WorkplaceCreate,
    WorkplaceRemove,
    WorkflowInvoke,
}

impl RpcOp {
    pub fn as_str(self) -> &'static str {
        match self {
            RpcOp::WorkplaceCreate => "workplace.create",
            RpcOp::WorkplaceRemove => "workplace.remove",
            RpcOp::WorkflowInvoke => "workflow.invoke",
        }
    }
}

impl fmt::Display for RpcOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RpcOp {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "workplace.create" => Ok(RpcOp::WorkplaceCreate),
            "workplace.remove" => Ok(RpcOp::WorkplaceRemove),
            "workflow.invoke" => Ok(RpcOp::WorkflowInvoke),
            other => Err(WorkflowError::message(format!("unsupported rpc operation '{other}'"))),
        }
    }
}

/// Run one RPC. The response is `{"id": <rpc id>, "result": <value>}`.
pub async fn execute_rpc<S: EngineStore>(
    engine: &WorkflowEngine<S>,
    rpc: RpcDescription,
) -> Result<Value, WorkflowError> {
    let op: RpcOp = rpc.op.parse()?;
    tracing::debug!(op = %op, id = %rpc.id, "executing rpc");

    let result = match op {
        RpcOp::WorkplaceCreate => {
            let description = WorkplaceDescription::from_json(&rpc.params)?;
            engine.create_workplace(description).await?;
            Value::Null
        }
        RpcOp::WorkplaceRemove => {
            let description = WorkplaceDescription::from_json(&rpc.params)?;
            Value::Bool(engine.remove_workplace(&description.name).await?)
        }
        RpcOp::WorkflowInvoke => {
            let description = WorkflowDescription::from_json(&rpc.params)?;
            Value::String(engine.invoke(description).await?)
        }
    };
    Ok(json!({ "id": rpc.id, "result": result }))
}

/// Parse a raw RPC document and run it.
pub async fn execute_rpc_json<S: EngineStore>(
    engine: &WorkflowEngine<S>,
    document: &Value,
) -> Result<Value, WorkflowError> {
    execute_rpc(engine, RpcDescription::from_json(document)?).await
}
