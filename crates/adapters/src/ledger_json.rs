//! JSON-file ledger

use async_trait::async_trait;
use digest_press_domain::{Ledger, LedgerEntry, LedgerError, LedgerRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::fs_atomic::write_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    /// Older tracker files keep the same map under `videos`
    #[serde(default, alias = "videos")]
    items: BTreeMap<String, LedgerEntry>,
}

/// Ledger kept as one JSON document, rewritten atomically on every record
pub struct JsonLedger {
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<String, LedgerEntry>>>,
}

impl JsonLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_file(&self) -> Result<BTreeMap<String, LedgerEntry>, LedgerError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(LedgerError::Storage(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let file: LedgerFile = serde_json::from_str(&content).map_err(|e| {
            LedgerError::Serialization(format!("{} is not a valid ledger: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), entries = file.items.len(), "Loaded ledger");
        Ok(file.items)
    }

    async fn write_file(&self, items: &BTreeMap<String, LedgerEntry>) -> Result<(), LedgerError> {
        let file = LedgerFile {
            items: items.clone(),
        };
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;

        write_atomic(&self.path, content.as_bytes())
            .await
            .map_err(|e| {
                LedgerError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
            })
    }
}

#[async_trait]
impl Ledger for JsonLedger {
    async fn contains(&self, item_id: &str) -> Result<bool, LedgerError> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }
        Ok(cache.as_ref().is_some_and(|items| items.contains_key(item_id)))
    }

    async fn record(&self, item_id: &str, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let mut cache = self.cache.lock().await;
        let mut items = match cache.take() {
            Some(items) => items,
            None => self.read_file().await?,
        };

        if items.contains_key(item_id) {
            *cache = Some(items);
            return Ok(());
        }

        items.insert(item_id.to_string(), entry.clone());
        match self.write_file(&items).await {
            Ok(()) => {
                *cache = Some(items);
                Ok(())
            }
            Err(e) => {
                items.remove(item_id);
                *cache = Some(items);
                Err(e)
            }
        }
    }

    async fn entries(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.read_file().await?);
        }

        let mut records: Vec<LedgerRecord> = cache
            .iter()
            .flatten()
            .map(|(item_id, entry)| LedgerRecord {
                item_id: item_id.clone(),
                entry: entry.clone(),
            })
            .collect();
        records.sort_by(|a, b| b.entry.processed_at.cmp(&a.entry.processed_at));
        Ok(records)
    }

    async fn clear(&self) -> Result<usize, LedgerError> {
        let mut cache = self.cache.lock().await;
        let count = match cache.take() {
            Some(items) => items.len(),
            None => self.read_file().await?.len(),
        };

        let empty = BTreeMap::new();
        self.write_file(&empty).await?;
        *cache = Some(empty);

        tracing::info!(path = %self.path.display(), removed = count, "Ledger cleared");
        Ok(count)
    }
}
