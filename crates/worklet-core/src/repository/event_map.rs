//! Context-event map store: routes incoming events to waiting contexts.

use std::collections::{BTreeSet, HashMap};

use worklet_types::error::RepositoryError;
use worklet_types::program_counter::ProgramCounter;

/// Routing table from `(event type, hint)` to waiting contexts.
///
/// The wait map holds at most one entry per `(event type, context)`;
/// registering again replaces the previous hints and program counter. The
/// trigger map is kept separately and stores the trigger worklet type.
pub trait ContextEventMapStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Completion waits
    // -----------------------------------------------------------------------

    fn register_event_map(
        &self,
        event_type: &str,
        hints: &BTreeSet<String>,
        context_name: &str,
        pc: &ProgramCounter,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn unregister_event_map(
        &self,
        event_type: &str,
        context_name: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Contexts waiting on `event_type` with `hint`, with the step they wait in.
    fn event_map_by_hint(
        &self,
        event_type: &str,
        hint: &str,
    ) -> impl std::future::Future<Output = Result<HashMap<String, ProgramCounter>, RepositoryError>> + Send;

    /// Whether `context_name` has any registered wait.
    fn is_event_map_present(
        &self,
        context_name: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Triggers
    // -----------------------------------------------------------------------

    fn register_trigger_event_map(
        &self,
        event_type: &str,
        hints: &BTreeSet<String>,
        context_name: &str,
        worklet_type: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Drop every trigger registration of `context_name`.
    fn unregister_trigger_event_map(
        &self,
        context_name: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Contexts with a trigger on `event_type` and `hint`, with the trigger worklet type.
    fn trigger_event_map_by_hint(
        &self,
        event_type: &str,
        hint: &str,
    ) -> impl std::future::Future<Output = Result<HashMap<String, String>, RepositoryError>> + Send;
}
