//! Run command - one discover, rewrite and deliver pass

use anyhow::{Context, Result};
use digest_press_adapters::{
    delivery::{OutboxDelivery, OutboxWriter, SmtpConfig as AdapterSmtpConfig, SmtpDelivery},
    ledger::{JsonLedger, SqliteLedger},
    podcast::XiaoyuzhouDiscovery,
    render::MarkdownDigestRenderer,
    secrets::EnvCredential,
    store::{FileRunLock, FsDigestArchive, FsTemplateStore, TomlSourceCatalog},
    supadata::SupadataTranscripts,
    youtube::YoutubeDiscovery,
};
use digest_press_domain::{
    Delivery, Ledger, RunOutcome, RunSummary, SourceKind, SystemClock, TranscriptSource,
    usecases::{AssembleConfig, Pipeline, PipelineConfig, PipelineDeps, SourceAdapters},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::args::RunArgs;
use crate::commands::rewrite::{build_rewriter, rewrite_config_from_config};
use crate::config::{AppConfig, DeliveryChannel, LedgerBackend};

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    tracing::info!(
        sources_file = %config.general.sources_file.display(),
        provider = %config.llm.provider,
        outbox = ?args.outbox,
        "Starting digest-press run"
    );

    let pipeline = build_pipeline(&config, args.outbox).await?;
    let summary = pipeline.run().await.context("Run aborted")?;

    report(&summary, args.json)?;
    finish(&summary)
}

/// Print the summary and log its outcome
pub(crate) fn report(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?
        );
    } else {
        for line in summary.log_lines() {
            println!("{}", line);
        }
    }

    tracing::info!(
        outcome = ?summary.outcome,
        articles = summary.articles_written,
        item_errors = summary.errors.len(),
        source_errors = summary.source_errors.len(),
        "digest-press run completed"
    );

    Ok(())
}

/// Exit with status 2 when the run needs operator attention
pub(crate) fn finish(summary: &RunSummary) -> Result<()> {
    let code = exit_code(summary);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn exit_code(summary: &RunSummary) -> i32 {
    match summary.outcome {
        RunOutcome::Delivered => 0,
        RunOutcome::DeliveryFailed => 2,
        _ if summary.has_errors() => 2,
        _ => 0,
    }
}

pub(crate) async fn build_pipeline(config: &AppConfig, outbox: Option<PathBuf>) -> Result<Pipeline> {
    let ledger = build_ledger(config).await?;
    let delivery = build_delivery(config, outbox).await?;
    let rewriter = Arc::from(build_rewriter(config)?);

    let deps = PipelineDeps {
        catalog: Arc::new(TomlSourceCatalog::new(&config.general.sources_file)),
        templates: Arc::new(FsTemplateStore::new(&config.general.template_file)),
        sources: build_sources(config)?,
        ledger,
        rewriter,
        renderer: Arc::new(MarkdownDigestRenderer::with_language(
            config.newsletter.language.clone(),
        )),
        delivery,
        archive: Arc::new(FsDigestArchive::new(&config.general.archive_dir)),
        lock: Arc::new(FileRunLock::new(
            &config.general.lock_file,
            time::Duration::hours(config.general.lock_stale_hours),
        )),
        clock: Arc::new(SystemClock),
    };

    Ok(Pipeline::new(deps, pipeline_config(config)))
}

pub(crate) async fn build_ledger(config: &AppConfig) -> Result<Arc<dyn Ledger>> {
    match config.ledger.backend {
        LedgerBackend::Json => Ok(Arc::new(JsonLedger::new(&config.ledger.path))),
        LedgerBackend::Sqlite => Ok(Arc::new(
            SqliteLedger::new(&config.ledger.path)
                .await
                .context("Failed to initialize SQLite ledger")?,
        )),
    }
}

fn build_sources(config: &AppConfig) -> Result<SourceAdapters> {
    let transcripts: Arc<dyn TranscriptSource> = Arc::new(build_transcripts(config)?);
    let max_items = config.discovery.max_items_per_source;

    let youtube = YoutubeDiscovery::new(
        EnvCredential::from_env(&config.youtube.api_key_env),
        max_items,
    )
    .context("Failed to build YouTube client")?;

    let mut sources =
        SourceAdapters::new().with(SourceKind::Youtube, Arc::new(youtube), transcripts.clone());

    if config.podcast.enabled {
        sources = sources.with(
            SourceKind::Podcast,
            Arc::new(build_podcast(config)?),
            transcripts,
        );
    } else {
        tracing::info!("Podcast sources disabled");
    }

    Ok(sources)
}

pub(crate) fn build_transcripts(config: &AppConfig) -> Result<SupadataTranscripts> {
    SupadataTranscripts::new(EnvCredential::from_env(&config.transcript.api_key_env))
        .context("Failed to build transcript client")
}

pub(crate) fn build_podcast(config: &AppConfig) -> Result<XiaoyuzhouDiscovery> {
    XiaoyuzhouDiscovery::new(config.discovery.max_items_per_source)
        .context("Failed to build podcast client")
}

async fn build_delivery(config: &AppConfig, outbox: Option<PathBuf>) -> Result<Arc<dyn Delivery>> {
    let outbox_dir = match (outbox, config.delivery.channel) {
        (Some(dir), _) => Some(dir),
        (None, DeliveryChannel::Outbox) => Some(config.delivery.outbox_dir.clone()),
        (None, DeliveryChannel::Smtp) => None,
    };

    if let Some(dir) = outbox_dir {
        let writer = OutboxWriter::new(dir.clone())
            .await
            .context("Failed to initialize outbox writer")?;
        tracing::info!(outbox = %dir.display(), "Writing digests to outbox");
        return Ok(Arc::new(OutboxDelivery::new(writer)));
    }

    let smtp = &config.delivery.smtp;
    let adapter_config = AdapterSmtpConfig {
        host: smtp.host.clone(),
        port: smtp.port,
        security: smtp.security,
        from_name: smtp.from_name.clone(),
        timeout_secs: smtp.timeout_secs,
    };

    Ok(Arc::new(SmtpDelivery::new(
        adapter_config,
        EnvCredential::from_env(&smtp.username_env),
        EnvCredential::from_env(&smtp.password_env),
    )))
}

pub(crate) fn pipeline_config(config: &AppConfig) -> PipelineConfig {
    PipelineConfig {
        lookback: time::Duration::days(config.discovery.lookback_days),
        recipient: resolve_recipient(config),
        item_pause: Duration::from_secs(config.discovery.item_pause_secs),
        rewrite: rewrite_config_from_config(config),
        assemble: AssembleConfig {
            newsletter_title: config.newsletter.title.clone(),
        },
    }
}

/// Configured recipient, or the SMTP account itself when none is set
fn resolve_recipient(config: &AppConfig) -> String {
    let recipient = config.newsletter.recipient.trim();
    if !recipient.is_empty() {
        return recipient.to_string();
    }

    match std::env::var(&config.delivery.smtp.username_env) {
        Ok(address) if !address.trim().is_empty() => address.trim().to_string(),
        _ => String::new(),
    }
}
