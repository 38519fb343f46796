//! Observability setup for the worklet engine: the global tracing
//! subscriber and the optional OpenTelemetry bridge.

pub mod tracing_setup;

pub use tracing_setup::{LogFormat, TracingOptions, init_tracing, shutdown_tracing};
