//! Engine configuration types.
//!
//! `EngineConfig` mirrors `engine.toml`. Every field has a default, so an
//! empty or missing file yields a usable configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the workflow execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many times event map registration is verified before giving up.
    #[serde(default = "default_register_event_map_waits")]
    pub register_event_map_waits: u32,

    /// Base backoff between verification attempts; attempt `n` sleeps
    /// `backoff * (n + 1)` milliseconds.
    #[serde(default = "default_register_event_map_backoff_ms")]
    pub register_event_map_backoff_ms: u64,

    /// Workplace that always exists and cannot be removed.
    #[serde(default = "default_system_workplace")]
    pub system_workplace: String,

    /// Capacity of the workflow data event broadcast channel.
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

fn default_register_event_map_waits() -> u32 {
    10
}

fn default_register_event_map_backoff_ms() -> u64 {
    10
}

fn default_system_workplace() -> String {
    "system_workplace".to_string()
}

fn default_event_bus_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            register_event_map_waits: default_register_event_map_waits(),
            register_event_map_backoff_ms: default_register_event_map_backoff_ms(),
            system_workplace: default_system_workplace(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}
