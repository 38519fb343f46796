//! SQLite storage.

pub mod log;
pub mod pool;

pub use log::SqliteLogStore;
pub use pool::DatabasePool;
