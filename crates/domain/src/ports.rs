//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{
    AssembledDigest, DigestFiles, DigestIssue, DigestRecord, Item, LedgerEntry, LedgerRecord,
    Source, SourceErrorKind, TranscriptOutcome,
};
use crate::template::{InstructionTemplate, TemplateError};

/// Error type for the source catalog store
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },
    #[error("Invalid source handle '{handle}' for kind {kind}")]
    InvalidHandle { handle: String, kind: String },
    #[error("Duplicate source '{0}'")]
    Duplicate(String),
}

/// Port for the operator-editable, ordered list of sources
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Load all sources in catalog order
    async fn load(&self) -> Result<Vec<Source>, CatalogError>;

    /// Replace the catalog with the given sources
    async fn save(&self, sources: &[Source]) -> Result<(), CatalogError>;
}

/// Port for the instruction template resource
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Load the current template (the built-in default when none was saved)
    async fn load(&self) -> Result<InstructionTemplate, TemplateError>;

    /// Validate and persist a new template
    async fn save(&self, template: &InstructionTemplate) -> Result<(), TemplateError>;

    /// Drop any saved template so the built-in default applies again
    async fn reset(&self) -> Result<(), TemplateError>;
}

/// Error type for discovery operations
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Transient error: {0}")]
    Transient(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Source not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DiscoveryError {
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            DiscoveryError::Transient(_) => SourceErrorKind::Transient,
            DiscoveryError::Auth(_) => SourceErrorKind::Auth,
            DiscoveryError::NotFound(_) => SourceErrorKind::NotFound,
            DiscoveryError::Config(_) => SourceErrorKind::Config,
        }
    }
}

/// Port for finding recent items of a source
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Fetch items published at or after `since`, in discovery order
    async fn discover(
        &self,
        source: &Source,
        since: OffsetDateTime,
    ) -> Result<Vec<Item>, DiscoveryError>;
}

/// Port for retrieving machine transcripts
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch the transcript of an item; never fails, every outcome is a value
    async fn fetch(&self, item: &Item) -> TranscriptOutcome;
}

/// Error type for the generative-text model
#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("LLM API error: {0}")]
    Api(String),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
    #[error("Model returned no text")]
    EmptyOutput,
    #[error("Rate limited")]
    RateLimited,
    #[error("Timeout")]
    Timeout,
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Port for the generative-text model call
#[async_trait]
pub trait Rewriter: Send + Sync {
    /// Send a fully rendered prompt and return the model's text
    async fn generate(&self, prompt: &str) -> Result<String, RewriteError>;

    /// Provider name for logs (e.g., "gemini")
    fn provider(&self) -> &'static str;
}

/// Error type for ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the durable record of processed items
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether an item was already turned into an article
    async fn contains(&self, item_id: &str) -> Result<bool, LedgerError>;

    /// Durably record a processed item; an existing entry is left untouched
    async fn record(&self, item_id: &str, entry: &LedgerEntry) -> Result<(), LedgerError>;

    /// All entries, most recently processed first
    async fn entries(&self) -> Result<Vec<LedgerRecord>, LedgerError>;

    /// Remove every entry; returns how many were removed
    async fn clear(&self) -> Result<usize, LedgerError>;
}

/// Error type for digest rendering
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Nothing to render")]
    Empty,
    #[error("HTML rendering failed: {0}")]
    Html(String),
    #[error("E-book packaging failed: {0}")]
    Ebook(String),
}

/// Port for turning an issue into distributable files
pub trait DigestRenderer: Send + Sync {
    fn render_html(&self, issue: &DigestIssue) -> Result<String, RenderError>;

    fn render_ebook(&self, issue: &DigestIssue) -> Result<Vec<u8>, RenderError>;
}

/// Error type for delivery operations
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid message: {0}")]
    Message(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Confirmation of a successful send
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// Channel-specific message identifier, if any
    pub message_id: Option<String>,
}

/// Port for sending a rendered digest to a mailbox
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Send the digest; all-or-nothing
    async fn send(
        &self,
        digest: &AssembledDigest,
        recipient: &str,
    ) -> Result<DeliveryReceipt, DeliveryError>;

    /// Channel name (e.g., "smtp", "outbox")
    fn channel(&self) -> &'static str;
}

/// Error type for the digest archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Port for the digest manifest and its rendered files
#[async_trait]
pub trait DigestArchive: Send + Sync {
    /// Persist the rendered HTML and e-book of a digest
    async fn store_files(&self, digest: &AssembledDigest) -> Result<DigestFiles, ArchiveError>;

    /// Append a manifest record for a sent digest
    async fn record(&self, record: &DigestRecord) -> Result<(), ArchiveError>;

    /// All manifest records, newest first
    async fn list(&self) -> Result<Vec<DigestRecord>, ArchiveError>;
}

/// Error type for the run-in-progress marker
#[derive(Debug, Error)]
pub enum RunLockError {
    #[error("Another run is in progress (since {0})")]
    Held(String),
    #[error("Lock error: {0}")]
    Io(String),
}

/// Port guarding against overlapping runs
#[async_trait]
pub trait RunLock: Send + Sync {
    async fn acquire(&self) -> Result<(), RunLockError>;

    async fn release(&self) -> Result<(), RunLockError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
