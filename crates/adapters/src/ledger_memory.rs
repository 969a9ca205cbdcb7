//! In-memory ledger for testing and throwaway runs

use async_trait::async_trait;
use digest_press_domain::{Ledger, LedgerEntry, LedgerError, LedgerRecord};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory ledger implementation
pub struct InMemoryLedger {
    items: RwLock<HashMap<String, LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn contains(&self, item_id: &str) -> Result<bool, LedgerError> {
        let items = self
            .items
            .read()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(items.contains_key(item_id))
    }

    async fn record(&self, item_id: &str, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let mut items = self
            .items
            .write()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        items
            .entry(item_id.to_string())
            .or_insert_with(|| entry.clone());
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let items = self
            .items
            .read()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let mut records: Vec<_> = items
            .iter()
            .map(|(item_id, entry)| LedgerRecord {
                item_id: item_id.clone(),
                entry: entry.clone(),
            })
            .collect();
        records.sort_by(|a, b| {
            b.entry
                .processed_at
                .cmp(&a.entry.processed_at)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        Ok(records)
    }

    async fn clear(&self) -> Result<usize, LedgerError> {
        let mut items = self
            .items
            .write()
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let count = items.len();
        items.clear();
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn test_record_is_first_write_wins() {
        let ledger = InMemoryLedger::new();
        let first = LedgerEntry {
            title: "first".to_string(),
            source: "Channel".to_string(),
            url: None,
            processed_at: OffsetDateTime::now_utc(),
        };
        let second = LedgerEntry {
            title: "second".to_string(),
            ..first.clone()
        };

        ledger.record("v1", &first).await.unwrap();
        ledger.record("v1", &second).await.unwrap();

        assert!(ledger.contains("v1").await.unwrap());
        assert_eq!(ledger.entries().await.unwrap()[0].entry.title, "first");
        assert_eq!(ledger.clear().await.unwrap(), 1);
        assert!(!ledger.contains("v1").await.unwrap());
    }
}
