//! In-memory store implementations.
//!
//! `MemoryStore` implements every store trait the engine needs. Its log
//! half is pluggable, so contexts can live in memory while the log goes to
//! SQLite.

pub mod log;
pub mod store;

pub use log::MemoryLogStore;
pub use store::MemoryStore;
