//! Workflow state machine, data binding, timers and store traits.
//!
//! This crate defines the "ports" (store traits) that the infrastructure
//! layer implements. It depends only on `worklet-types`, never on
//! `worklet-infra` or any database crate.

pub mod event;
pub mod repository;
pub mod workflow;
