//! Pipeline use case - discovers, transcribes, rewrites, assembles and delivers

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    model::{
        Article, DigestRecord, Item, ItemError, ItemErrorKind, LedgerEntry, RunOutcome,
        RunSummary, Source, SourceError, SourceErrorKind, SourceKind, TranscriptOutcome,
    },
    ports::{
        ArchiveError, CatalogError, Clock, DigestArchive, DigestRenderer, Delivery, Discovery,
        Ledger, LedgerError, RenderError, Rewriter, RunLock, RunLockError, SourceCatalog,
        TemplateStore, TranscriptSource,
    },
    template::{InstructionTemplate, TemplateError},
    usecases::{
        assemble::{AssembleConfig, NewsletterAssembler},
        rewrite::{RewriteConfig, RewriteEngine},
    },
};
use tokio::time::sleep;

/// Kind-specific discovery and transcript adapters
#[derive(Clone, Default)]
pub struct SourceAdapters {
    discovery: HashMap<SourceKind, Arc<dyn Discovery>>,
    transcripts: HashMap<SourceKind, Arc<dyn TranscriptSource>>,
}

impl SourceAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the adapters used for every source of `kind`
    pub fn with(
        mut self,
        kind: SourceKind,
        discovery: Arc<dyn Discovery>,
        transcripts: Arc<dyn TranscriptSource>,
    ) -> Self {
        self.discovery.insert(kind, discovery);
        self.transcripts.insert(kind, transcripts);
        self
    }

    pub fn discovery(&self, kind: SourceKind) -> Option<&Arc<dyn Discovery>> {
        self.discovery.get(&kind)
    }

    pub fn transcripts(&self, kind: SourceKind) -> Option<&Arc<dyn TranscriptSource>> {
        self.transcripts.get(&kind)
    }
}

/// Collaborators of the pipeline
#[derive(Clone)]
pub struct PipelineDeps {
    pub catalog: Arc<dyn SourceCatalog>,
    pub templates: Arc<dyn TemplateStore>,
    pub sources: SourceAdapters,
    pub ledger: Arc<dyn Ledger>,
    pub rewriter: Arc<dyn Rewriter>,
    pub renderer: Arc<dyn DigestRenderer>,
    pub delivery: Arc<dyn Delivery>,
    pub archive: Arc<dyn DigestArchive>,
    pub lock: Arc<dyn RunLock>,
    pub clock: Arc<dyn Clock>,
}

/// Configuration for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Only items published within this window are discovered
    pub lookback: time::Duration,
    /// Mailbox the digest is sent to
    pub recipient: String,
    /// Pause between consecutive items (politeness toward the transcript service)
    pub item_pause: std::time::Duration,
    /// Rewrite engine config
    pub rewrite: RewriteConfig,
    /// Newsletter assembly config
    pub assemble: AssembleConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback: time::Duration::days(7),
            recipient: String::new(),
            item_pause: std::time::Duration::ZERO,
            rewrite: RewriteConfig::default(),
            assemble: AssembleConfig::default(),
        }
    }
}

/// Run-fatal errors; everything else is collected into the run summary
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Another run is in progress (since {0})")]
    AlreadyRunning(String),
    #[error("Run lock error: {0}")]
    Lock(String),
    #[error("Source catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Instruction template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Digest rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("Digest archive error: {0}")]
    Archive(#[from] ArchiveError),
}

/// Pipeline orchestrator
pub struct Pipeline {
    deps: PipelineDeps,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(deps: PipelineDeps, config: PipelineConfig) -> Self {
        Self { deps, config }
    }

    /// One full run over the source catalog
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        self.acquire_lock().await?;
        let result = self.run_catalog().await;
        self.release_lock().await;
        result
    }

    /// Run the ledger, rewrite, assembly and delivery stages for explicit items
    pub async fn run_items(&self, items: Vec<Item>) -> Result<RunSummary, PipelineError> {
        self.acquire_lock().await?;
        let result = self.run_explicit(items).await;
        self.release_lock().await;
        result
    }

    async fn acquire_lock(&self) -> Result<(), PipelineError> {
        self.deps.lock.acquire().await.map_err(|e| match e {
            RunLockError::Held(since) => PipelineError::AlreadyRunning(since),
            RunLockError::Io(message) => PipelineError::Lock(message),
        })
    }

    async fn release_lock(&self) {
        if let Err(e) = self.deps.lock.release().await {
            tracing::warn!(error = %e, "Failed to release run lock");
        }
    }

    async fn run_catalog(&self) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::new(self.deps.clock.now());

        let sources = self.deps.catalog.load().await?;
        if sources.is_empty() {
            tracing::info!("Source catalog is empty, nothing to do");
            summary.outcome = RunOutcome::NoSources;
            return Ok(self.finish(summary));
        }

        let template = self.load_template().await?;

        tracing::info!(source_count = sources.len(), "Starting run");

        let since = self.deps.clock.now() - self.config.lookback;
        let mut candidates = Vec::new();
        for source in &sources {
            summary.sources_checked += 1;
            match self.discover(source, since).await {
                Ok(items) => candidates.extend(items),
                Err(error) => summary.source_errors.push(error),
            }
        }

        self.process(candidates, &template, summary).await
    }

    async fn run_explicit(&self, items: Vec<Item>) -> Result<RunSummary, PipelineError> {
        let summary = RunSummary::new(self.deps.clock.now());
        let template = self.load_template().await?;
        self.process(items, &template, summary).await
    }

    async fn load_template(&self) -> Result<InstructionTemplate, PipelineError> {
        let template = self.deps.templates.load().await?;
        template.validate()?;
        tracing::debug!(template_hash = %template.hash(), "Loaded instruction template");
        Ok(template)
    }

    async fn discover(
        &self,
        source: &Source,
        since: time::OffsetDateTime,
    ) -> Result<Vec<Item>, SourceError> {
        let Some(discovery) = self.deps.sources.discovery(source.kind) else {
            return Err(SourceError {
                source: source.clone(),
                kind: SourceErrorKind::Config,
                message: format!("No discovery adapter for {} sources", source.kind),
            });
        };

        match discovery.discover(source, since).await {
            Ok(items) => {
                tracing::info!(source = %source, count = items.len(), "Discovered items");
                Ok(items)
            }
            Err(e) => {
                let kind = e.kind();
                match kind {
                    SourceErrorKind::Transient => {
                        tracing::warn!(source = %source, error = %e, "Discovery failed, skipping source")
                    }
                    _ => {
                        tracing::error!(source = %source, error = %e, "Discovery failed, skipping source")
                    }
                }
                Err(SourceError {
                    source: source.clone(),
                    kind,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Filter against the ledger, then work the queue and deliver
    async fn process(
        &self,
        candidates: Vec<Item>,
        template: &InstructionTemplate,
        mut summary: RunSummary,
    ) -> Result<RunSummary, PipelineError> {
        let mut seen = HashSet::new();
        let mut queue = Vec::new();
        for item in candidates {
            if !seen.insert(item.id.clone()) {
                tracing::debug!(item_id = %item.id, "Item discovered twice, keeping first");
                continue;
            }
            summary.items_discovered += 1;
            if self.deps.ledger.contains(&item.id).await? {
                summary.items_already_processed += 1;
                continue;
            }
            queue.push(item);
        }

        if queue.is_empty() {
            tracing::info!(
                discovered = summary.items_discovered,
                "No new items to process"
            );
            summary.outcome = RunOutcome::NoNewItems;
            return Ok(self.finish(summary));
        }

        tracing::info!(queued = queue.len(), "Processing new items");

        let articles = self.work_queue(&queue, template, &mut summary).await;
        summary.articles_written = articles.len();

        if articles.is_empty() {
            summary.outcome = RunOutcome::NoArticles;
            return Ok(self.finish(summary));
        }

        self.deliver(&articles, template, &mut summary).await?;
        Ok(self.finish(summary))
    }

    async fn work_queue(
        &self,
        queue: &[Item],
        template: &InstructionTemplate,
        summary: &mut RunSummary,
    ) -> Vec<Article> {
        let engine = RewriteEngine::new(self.deps.rewriter.as_ref(), self.config.rewrite.clone());
        let mut articles = Vec::new();

        for (index, item) in queue.iter().enumerate() {
            if index > 0 && !self.config.item_pause.is_zero() {
                sleep(self.config.item_pause).await;
            }
            summary.items_processed += 1;

            let Some(transcript) = self.fetch_transcript(item).await else {
                // The outcome was logged; the item stays eligible next run
                summary.errors.push(item_error(
                    item,
                    ItemErrorKind::NoTranscript,
                    "No transcript available".to_string(),
                ));
                continue;
            };

            let article = match engine.rewrite(item, &transcript, template).await {
                Ok(article) => article,
                Err(e) => {
                    tracing::warn!(item_id = %item.id, error = %e, "Rewrite failed, skipping item");
                    summary
                        .errors
                        .push(item_error(item, ItemErrorKind::RewriteFailed, e.to_string()));
                    continue;
                }
            };

            articles.push(article);

            let entry = LedgerEntry {
                title: item.title.clone(),
                source: item.source_name.clone(),
                url: Some(item.url.clone()),
                processed_at: self.deps.clock.now(),
            };
            if let Err(e) = self.deps.ledger.record(&item.id, &entry).await {
                tracing::error!(
                    item_id = %item.id,
                    error = %e,
                    "Ledger write failed, stopping the queue"
                );
                summary
                    .errors
                    .push(item_error(item, ItemErrorKind::LedgerWriteFailed, e.to_string()));
                break;
            }

            tracing::info!(item_id = %item.id, title = %item.title, "Article written");
        }

        articles
    }

    async fn fetch_transcript(&self, item: &Item) -> Option<String> {
        let outcome = match self.deps.sources.transcripts(item.source.kind) {
            Some(transcripts) => transcripts.fetch(item).await,
            None => TranscriptOutcome::Failed(format!(
                "No transcript adapter for {} sources",
                item.source.kind
            )),
        };

        match &outcome {
            TranscriptOutcome::Text(text) if !text.trim().is_empty() => {
                tracing::info!(item_id = %item.id, chars = text.chars().count(), "Transcript fetched")
            }
            TranscriptOutcome::Text(_) => {
                tracing::info!(item_id = %item.id, "Transcript was empty")
            }
            TranscriptOutcome::NotAvailable(reason) => {
                tracing::info!(item_id = %item.id, reason = %reason, "Transcript not available")
            }
            TranscriptOutcome::RateLimited => {
                tracing::warn!(item_id = %item.id, "Transcript service rate limited")
            }
            TranscriptOutcome::Failed(reason) => {
                tracing::warn!(item_id = %item.id, reason = %reason, "Transcript request failed")
            }
        }

        outcome.into_text()
    }

    async fn deliver(
        &self,
        articles: &[Article],
        template: &InstructionTemplate,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let assembler = NewsletterAssembler::new(
            self.deps.renderer.as_ref(),
            self.config.assemble.clone(),
        );
        let digest = assembler.assemble(articles, &template.hash(), self.deps.clock.now())?;
        let files = self.deps.archive.store_files(&digest).await?;

        let sent = self
            .deps
            .delivery
            .send(&digest, &self.config.recipient)
            .await;

        match sent {
            Ok(receipt) => {
                tracing::info!(
                    channel = self.deps.delivery.channel(),
                    recipient = %self.config.recipient,
                    message_id = ?receipt.message_id,
                    "Newsletter sent"
                );
                let record = DigestRecord {
                    manifest: digest.manifest,
                    files,
                    delivered_to: self.config.recipient.clone(),
                    channel: self.deps.delivery.channel().to_string(),
                };
                if let Err(e) = self.deps.archive.record(&record).await {
                    tracing::error!(error = %e, "Failed to record digest manifest");
                }
                summary.digest = Some(record);
                summary.outcome = RunOutcome::Delivered;
            }
            Err(e) => {
                tracing::error!(
                    channel = self.deps.delivery.channel(),
                    error = %e,
                    html_file = %files.html_file,
                    "Newsletter delivery failed"
                );
                summary.delivery_error = Some(e.to_string());
                summary.unsent_files = Some(files);
                summary.outcome = RunOutcome::DeliveryFailed;
            }
        }

        Ok(())
    }

    fn finish(&self, mut summary: RunSummary) -> RunSummary {
        summary.finished_at = self.deps.clock.now();
        tracing::info!(
            outcome = ?summary.outcome,
            items_processed = summary.items_processed,
            articles_written = summary.articles_written,
            errors = summary.errors.len(),
            source_errors = summary.source_errors.len(),
            "Run finished"
        );
        summary
    }
}

fn item_error(item: &Item, kind: ItemErrorKind, message: String) -> ItemError {
    ItemError {
        item_id: item.id.clone(),
        title: item.title.clone(),
        kind,
        message,
    }
}
