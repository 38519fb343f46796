//! Workflow data change notifications.
//!
//! The engine publishes a `WorkflowDataEvent` whenever a context is
//! inserted, committed or removed.

pub mod bus;

pub use bus::EventBus;
