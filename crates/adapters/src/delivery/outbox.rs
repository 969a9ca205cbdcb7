//! Outbox delivery for review without sending mail.

use async_trait::async_trait;
use digest_press_domain::{AssembledDigest, Delivery, DeliveryError, DeliveryReceipt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::fs_atomic::write_atomic;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Appends one JSON line per delivered digest to `outbox.jsonl`
#[derive(Debug, Clone)]
pub struct OutboxWriter {
    dir: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl OutboxWriter {
    pub async fn new(dir: PathBuf) -> Result<Self, OutboxError> {
        fs::create_dir_all(&dir).await?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("outbox.jsonl"))
            .await?;

        Ok(Self {
            dir,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn append(&self, entry: &OutboxEntry<'_>) -> Result<(), OutboxError> {
        let line = serde_json::to_string(entry)?;
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

/// Writes the rendered HTML and EPUB into a directory instead of mailing them
#[derive(Debug, Clone)]
pub struct OutboxDelivery {
    writer: OutboxWriter,
}

impl OutboxDelivery {
    pub fn new(writer: OutboxWriter) -> Self {
        Self { writer }
    }
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    id: &'a str,
    recipient: &'a str,
    subject: &'a str,
    html_file: &'a str,
    ebook_file: &'a str,
    article_count: usize,
    article_titles: &'a [String],
}

#[async_trait]
impl Delivery for OutboxDelivery {
    async fn send(
        &self,
        digest: &AssembledDigest,
        recipient: &str,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let id = Uuid::new_v4().to_string();
        let html_path = self.writer.dir().join(format!("{}.html", id));
        let ebook_path = self.writer.dir().join(format!("{}.epub", id));

        write_atomic(&html_path, digest.html.as_bytes())
            .await
            .map_err(|error| DeliveryError::Transport(format!("Outbox write failed: {}", error)))?;
        write_atomic(&ebook_path, &digest.ebook)
            .await
            .map_err(|error| DeliveryError::Transport(format!("Outbox write failed: {}", error)))?;

        let html_file = html_path.display().to_string();
        let ebook_file = ebook_path.display().to_string();
        let entry = OutboxEntry {
            id: &id,
            recipient,
            subject: &digest.subject,
            html_file: &html_file,
            ebook_file: &ebook_file,
            article_count: digest.manifest.article_count,
            article_titles: &digest.manifest.article_titles,
        };

        self.writer
            .append(&entry)
            .await
            .map_err(|error| DeliveryError::Transport(format!("Outbox write failed: {}", error)))?;

        tracing::info!(id = %id, dir = %self.writer.dir().display(), "Digest written to outbox");

        Ok(DeliveryReceipt {
            message_id: Some(id),
        })
    }

    fn channel(&self) -> &'static str {
        "outbox"
    }
}
