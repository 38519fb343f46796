use std::collections::BTreeMap;

use thiserror::Error;

/// Errors raised while defining, binding or executing workflows.
///
/// Every failure that crosses a module boundary in the engine is expressed
/// as one of these variants; binder and serde failures are wrapped before
/// they reach callers.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Message(String),

    #[error("{message}: {source}")]
    Wrapped {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid data model for workflow '{workflow}': {}", join_field_errors(.errors))]
    InvalidDataModel {
        workflow: String,
        errors: BTreeMap<String, String>,
    },

    #[error("invalid workflow definition '{workflow_id}': {}", .errors.join("; "))]
    InvalidDefinition {
        workflow_id: String,
        errors: Vec<String>,
    },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("no node at required path '{0}'")]
    MissingPath(String),

    #[error("type mismatch at '{path}': expected {expected}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("path '{0}' is already occupied")]
    PathOccupied(String),

    #[error("invalid program counter '{0}'")]
    InvalidProgramCounter(String),

    #[error("program counter {pc} is out of bounds for a program of {len} worklets")]
    ProgramCounterOutOfBounds { pc: String, len: usize },

    #[error("workflow '{workflow_id}' exceeded {max} worklet evaluations (runaway workflow)")]
    RunawayWorkflow { workflow_id: String, max: usize },

    #[error("workflow '{0}' reached the end of its program but not COMPLETED")]
    ReachedEndNotCompleted(String),

    #[error("unknown worklet type '{0}'")]
    UnknownWorklet(String),

    #[error("{operation} is not supported by worklet '{worklet}'")]
    UnsupportedOperation { worklet: String, operation: String },

    #[error("{builder}: missing required field '{field}'")]
    MissingField {
        builder: &'static str,
        field: &'static str,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Wrap a lower-level error with a description of what was being attempted.
    pub fn wrap(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Wrapped {
            message: message.into(),
            source: Box::new(source),
        }
    }

    pub fn type_mismatch(
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn unsupported(worklet: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            worklet: worklet.into(),
            operation: operation.into(),
        }
    }
}

fn join_field_errors(errors: &BTreeMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from repository operations (used by the store traits in worklet-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}
