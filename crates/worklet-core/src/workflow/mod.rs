//! Workflow engine core.
//!
//! - `worklet` -- worklet contract, branch/trigger variants and sentinels
//! - `registry` -- name-keyed worklet factories
//! - `definition` -- immutable program and next-step resolution
//! - `context` -- per-run state: data tree, program counter, pending waits
//! - `binding` / `injector` -- field binding descriptors, inject and inhale
//! - `validator` -- data model checks before a run starts
//! - `task` -- handler tasks produced by events and timers
//! - `timer` -- single-timer deadline multiplexer
//! - `engine` -- the execution driver
//! - `rpc` -- JSON RPC dispatch onto the engine

pub mod binding;
pub mod context;
pub mod definition;
pub mod engine;
pub mod injector;
pub mod registry;
pub mod rpc;
pub mod task;
pub mod timer;
pub mod validator;
pub mod worklet;

pub use context::WorkflowContext;
pub use definition::{MAX_WORKS, Workflow};
pub use engine::WorkflowEngine;
pub use registry::WorkletRegistry;
pub use timer::TimerChain;
pub use worklet::{BranchWorklet, DataModelBinding, Sentinel, TriggerWorklet, Worklet, WorkletInstance};
