//! Append-only per-context log.

use worklet_types::error::RepositoryError;
use worklet_types::log::LogEntry;

pub trait WorkflowLogStore: Send + Sync {
    fn add_log(
        &self,
        context_name: &str,
        message: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn add_exception(
        &self,
        context_name: &str,
        message: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Entries for `context_name`, oldest first.
    fn get_log(
        &self,
        context_name: &str,
    ) -> impl std::future::Future<Output = Result<Vec<LogEntry>, RepositoryError>> + Send;
}
