//! digest-press adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `store`: source catalog, instruction template, run lock and digest archive on disk
//! - `ledger`: JSON, SQLite and in-memory processed-item ledgers
//! - `youtube`, `podcast`: discovery of recent videos and episodes
//! - `supadata`: transcript retrieval
//! - `llm`: LLM provider adapters (Gemini, Anthropic, OpenAI, Ollama)
//! - `render`: HTML email and EPUB rendering
//! - `delivery`: SMTP, outbox and stub delivery

mod archive_fs;
mod catalog_fs;
mod fs_atomic;
mod ledger_json;
mod ledger_memory;
mod ledger_sqlite;
mod lock_file;
mod template_fs;

pub mod delivery;
pub mod llm;
pub mod podcast;
pub mod render;
pub mod secrets;
pub mod supadata;
pub mod youtube;

/// Re-exports for file-backed stores
pub mod store {
    pub use crate::archive_fs::FsDigestArchive;
    pub use crate::catalog_fs::TomlSourceCatalog;
    pub use crate::lock_file::{FileRunLock, InMemoryRunLock};
    pub use crate::template_fs::FsTemplateStore;
}

/// Re-exports for ledger adapters
pub mod ledger {
    pub use crate::ledger_json::JsonLedger;
    pub use crate::ledger_memory::InMemoryLedger;
    pub use crate::ledger_sqlite::SqliteLedger;
}
