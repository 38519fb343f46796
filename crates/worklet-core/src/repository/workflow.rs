//! Workflow definition store.

use worklet_types::error::RepositoryError;

use crate::workflow::Workflow;

/// Registered workflow programs, keyed by workflow id.
pub trait WorkflowStore: Send + Sync {
    /// Insert or replace a workflow by id.
    fn register_workflow(
        &self,
        workflow: Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a workflow. Returns `true` if it existed.
    fn unregister_workflow(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn get_workflow(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    fn workflows(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Workflow>, RepositoryError>> + Send;
}
