//! Application use cases / business logic

pub mod assemble;
pub mod pipeline;
pub mod rewrite;

pub use assemble::{AssembleConfig, NewsletterAssembler, display_date};
pub use pipeline::{Pipeline, PipelineConfig, PipelineDeps, PipelineError, SourceAdapters};
pub use rewrite::{RewriteConfig, RewriteEngine, RewriteFailure};
