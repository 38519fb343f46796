//! In-memory workflow log.

use dashmap::DashMap;
use worklet_core::repository::WorkflowLogStore;
use worklet_types::error::RepositoryError;
use worklet_types::log::{LogEntry, LogLevel};

#[derive(Debug, Default)]
pub struct MemoryLogStore {
    entries: DashMap<String, Vec<LogEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, context_name: &str, level: LogLevel, message: &str) {
        self.entries
            .entry(context_name.to_string())
            .or_default()
            .push(LogEntry::new(context_name, level, message));
    }
}

impl WorkflowLogStore for MemoryLogStore {
    async fn add_log(&self, context_name: &str, message: &str) -> Result<(), RepositoryError> {
        self.append(context_name, LogLevel::Info, message);
        Ok(())
    }

    async fn add_exception(&self, context_name: &str, message: &str) -> Result<(), RepositoryError> {
        self.append(context_name, LogLevel::Exception, message);
        Ok(())
    }

    async fn get_log(&self, context_name: &str) -> Result<Vec<LogEntry>, RepositoryError> {
        Ok(self
            .entries
            .get(context_name)
            .map(|entries| entries.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_are_kept_per_context_in_order() {
        let store = MemoryLogStore::new();
        store.add_log("lab:a", "first").await.unwrap();
        store.add_exception("lab:a", "boom").await.unwrap();
        store.add_log("lab:b", "other").await.unwrap();

        let log = store.get_log("lab:a").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, "first");
        assert_eq!(log[1].level, LogLevel::Exception);
        assert!(store.get_log("lab:missing").await.unwrap().is_empty());
    }
}
