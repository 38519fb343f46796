//! Infrastructure layer for the worklet engine.
//!
//! Implements the store traits defined in `worklet-core`: in-memory stores
//! on `dashmap`, a SQLite-backed workflow log, and the `engine.toml` loader.

pub mod config;
pub mod memory;
pub mod sqlite;
