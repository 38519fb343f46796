//! SQLite-backed workflow log.

use chrono::{DateTime, Utc};
use sqlx::Row;
use worklet_core::repository::WorkflowLogStore;
use worklet_types::error::RepositoryError;
use worklet_types::log::{LogEntry, LogLevel};

use super::pool::DatabasePool;

pub struct SqliteLogStore {
    pool: DatabasePool,
}

impl SqliteLogStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn append(&self, entry: LogEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflow_log (context_name, level, message, created_at)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(&entry.context_name)
        .bind(entry.level.as_str())
        .bind(&entry.message)
        .bind(entry.time.to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    /// Drop every entry of `context_name`. Returns the number removed.
    pub async fn clear(&self, context_name: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflow_log WHERE context_name = ?")
            .bind(context_name)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

impl WorkflowLogStore for SqliteLogStore {
    async fn add_log(&self, context_name: &str, message: &str) -> Result<(), RepositoryError> {
        self.append(LogEntry::new(context_name, LogLevel::Info, message)).await
    }

    async fn add_exception(&self, context_name: &str, message: &str) -> Result<(), RepositoryError> {
        self.append(LogEntry::new(context_name, LogLevel::Exception, message))
            .await
    }

    async fn get_log(&self, context_name: &str) -> Result<Vec<LogEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT context_name, level, message, created_at FROM workflow_log WHERE context_name = ? ORDER BY id ASC",
        )
        .bind(context_name)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_entry).collect()
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<LogEntry, RepositoryError> {
    let level: String = row.get("level");
    let created_at: String = row.get("created_at");
    Ok(LogEntry {
        context_name: row.get("context_name"),
        level: level
            .parse::<LogLevel>()
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        message: row.get("message"),
        time: parse_datetime(&created_at)?,
    })
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn log_round_trips_in_insertion_order() {
        let store = SqliteLogStore::new(test_pool().await);
        store.add_log("lab:of:wf", "processing Discover").await.unwrap();
        store.add_exception("lab:of:wf", "device unreachable").await.unwrap();
        store.add_log("lab:other", "unrelated").await.unwrap();

        let log = store.get_log("lab:of:wf").await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, "processing Discover");
        assert_eq!(log[0].level, LogLevel::Info);
        assert_eq!(log[1].level, LogLevel::Exception);
        assert_eq!(log[1].context_name, "lab:of:wf");
    }

    #[tokio::test]
    async fn clear_removes_only_one_context() {
        let store = SqliteLogStore::new(test_pool().await);
        store.add_log("lab:a", "one").await.unwrap();
        store.add_log("lab:a", "two").await.unwrap();
        store.add_log("lab:b", "three").await.unwrap();

        assert_eq!(store.clear("lab:a").await.unwrap(), 2);
        assert!(store.get_log("lab:a").await.unwrap().is_empty());
        assert_eq!(store.get_log("lab:b").await.unwrap().len(), 1);
    }
}
