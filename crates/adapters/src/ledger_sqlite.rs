//! SQLite ledger implementation

use async_trait::async_trait;
use digest_press_domain::{Ledger, LedgerEntry, LedgerError, LedgerRecord};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

/// SQLite-backed ledger
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    /// Open (or create) the ledger database
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;

        Ok(ledger)
    }

    /// Create an in-memory SQLite ledger (for testing)
    pub async fn in_memory() -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;

        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_items (
                item_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                source TEXT NOT NULL,
                url TEXT,
                processed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn contains(&self, item_id: &str) -> Result<bool, LedgerError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM processed_items WHERE item_id = ?")
                .bind(item_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(count.0 > 0)
    }

    async fn record(&self, item_id: &str, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let processed_at = entry
            .processed_at
            .to_offset(UtcOffset::UTC)
            .format(&Rfc3339)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO processed_items (item_id, title, source, url, processed_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(item_id) DO NOTHING
            "#,
        )
        .bind(item_id)
        .bind(&entry.title)
        .bind(&entry.source)
        .bind(&entry.url)
        .bind(&processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn entries(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let rows: Vec<(String, String, String, Option<String>, String)> = sqlx::query_as(
            r#"
            SELECT item_id, title, source, url, processed_at
            FROM processed_items
            ORDER BY processed_at DESC, item_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        rows.into_iter()
            .map(|(item_id, title, source, url, processed_at)| {
                let processed_at = OffsetDateTime::parse(&processed_at, &Rfc3339)
                    .map_err(|e| LedgerError::Serialization(e.to_string()))?;
                Ok(LedgerRecord {
                    item_id,
                    entry: LedgerEntry {
                        title,
                        source,
                        url,
                        processed_at,
                    },
                })
            })
            .collect()
    }

    async fn clear(&self) -> Result<usize, LedgerError> {
        let result = sqlx::query("DELETE FROM processed_items")
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tracing::info!(removed = result.rows_affected(), "Ledger cleared");
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn entry(title: &str, processed_at: OffsetDateTime) -> LedgerEntry {
        LedgerEntry {
            title: title.to_string(),
            source: "Podcast".to_string(),
            url: None,
            processed_at,
        }
    }

    #[tokio::test]
    async fn test_record_and_contains() {
        let ledger = SqliteLedger::in_memory().await.unwrap();

        assert!(!ledger.contains("ep1").await.unwrap());
        ledger
            .record("ep1", &entry("Episode", datetime!(2026-10-01 10:00 UTC)))
            .await
            .unwrap();
        assert!(ledger.contains("ep1").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_keeps_first_entry() {
        let ledger = SqliteLedger::in_memory().await.unwrap();

        ledger
            .record("ep1", &entry("first", datetime!(2026-10-01 10:00 UTC)))
            .await
            .unwrap();
        ledger
            .record("ep1", &entry("second", datetime!(2026-10-05 10:00 UTC)))
            .await
            .unwrap();

        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry.title, "first");
    }

    #[tokio::test]
    async fn test_entries_newest_first_and_clear() {
        let ledger = SqliteLedger::in_memory().await.unwrap();

        ledger
            .record("old", &entry("old", datetime!(2026-09-01 10:00 +02:00)))
            .await
            .unwrap();
        ledger
            .record("new", &entry("new", datetime!(2026-10-01 10:00 UTC)))
            .await
            .unwrap();

        let ids: Vec<_> = ledger
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.item_id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);

        assert_eq!(ledger.clear().await.unwrap(), 2);
        assert!(ledger.entries().await.unwrap().is_empty());
    }
}
