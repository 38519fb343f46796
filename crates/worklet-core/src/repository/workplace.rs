//! Workplace and workflow context store.

use worklet_types::error::RepositoryError;
use worklet_types::workflow::Workplace;

use crate::workflow::WorkflowContext;

/// Workplaces and the contexts running in them.
///
/// Contexts are keyed by [`WorkflowContext::name`]; each belongs to the
/// workplace named by [`WorkflowContext::workplace_name`].
pub trait WorkplaceStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Workplaces
    // -----------------------------------------------------------------------

    /// Insert a workplace. Fails with `Conflict` if the name is taken.
    fn register_workplace(
        &self,
        workplace: Workplace,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a workplace. Returns `true` if it existed.
    fn remove_workplace(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn get_workplace(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Workplace>, RepositoryError>> + Send;

    fn workplaces(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Workplace>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Contexts
    // -----------------------------------------------------------------------

    /// Insert a new context. Fails with `Conflict` if the name is taken.
    fn register_context(
        &self,
        context: WorkflowContext,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a context. Returns `true` if it existed.
    fn remove_context(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    fn get_context(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowContext>, RepositoryError>> + Send;

    /// Replace a stored context. Fails with `NotFound` if it was removed.
    fn commit_context(
        &self,
        context: WorkflowContext,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn contexts(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowContext>, RepositoryError>> + Send;

    /// Contexts belonging to `workplace`.
    fn workplace_contexts(
        &self,
        workplace: &str,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowContext>, RepositoryError>> + Send;
}
