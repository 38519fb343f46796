//! Store trait definitions (ports).
//!
//! The engine reaches workflows, workplaces, contexts, the context-event
//! map and the per-context log only through these traits. `worklet-infra`
//! provides the implementations; this crate never names a storage
//! technology.

pub mod event_map;
pub mod log;
pub mod workflow;
pub mod workplace;

pub use event_map::ContextEventMapStore;
pub use log::WorkflowLogStore;
pub use workflow::WorkflowStore;
pub use workplace::WorkplaceStore;

/// Everything the engine needs from storage.
pub trait EngineStore:
    WorkflowStore + WorkplaceStore + ContextEventMapStore + WorkflowLogStore + 'static
{
}

impl<T> EngineStore for T where
    T: WorkflowStore + WorkplaceStore + ContextEventMapStore + WorkflowLogStore + 'static
{
}
