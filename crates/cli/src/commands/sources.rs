//! Sources command - manage the source catalog

use anyhow::{Context, Result, bail};
use digest_press_adapters::store::TomlSourceCatalog;
use digest_press_domain::{Source, SourceCatalog};
use std::path::PathBuf;

use crate::args::{SourcesArgs, SourcesCommands};
use crate::config::AppConfig;

pub async fn execute(args: SourcesArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let catalog = TomlSourceCatalog::new(&config.general.sources_file);

    match args.command {
        SourcesCommands::List { json } => list_sources(&catalog, json).await,
        SourcesCommands::Add { input } => add_source(&catalog, &input).await,
        SourcesCommands::Remove { handle } => remove_source(&catalog, &handle).await,
    }
}

async fn list_sources(catalog: &TomlSourceCatalog, json: bool) -> Result<()> {
    let sources = catalog.load().await.context("Failed to load source catalog")?;

    if json {
        let output = serde_json::json!({
            "count": sources.len(),
            "sources": sources,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("No sources configured.");
        println!("Add one with: digest-press sources add https://www.youtube.com/@channel");
        return Ok(());
    }

    println!("Sources ({} configured)", sources.len());
    println!("=======");
    for source in &sources {
        println!("  {:<28} {}", source.handle, source.kind);
    }

    Ok(())
}

async fn add_source(catalog: &TomlSourceCatalog, input: &str) -> Result<()> {
    let Some(source) = Source::parse(input) else {
        bail!(
            "Could not recognize '{}'. Use a channel URL, @handle, UC… channel id or podcast URL",
            input
        );
    };

    let mut sources = catalog.load().await.context("Failed to load source catalog")?;

    if sources
        .iter()
        .any(|s| s.kind == source.kind && s.handle.eq_ignore_ascii_case(&source.handle))
    {
        println!("Already following {}", source);
        return Ok(());
    }

    sources.push(source.clone());
    catalog
        .save(&sources)
        .await
        .with_context(|| format!("Failed to save {}", catalog.path().display()))?;

    tracing::info!(source = %source, "Source added");
    println!("Added {}", source);
    Ok(())
}

async fn remove_source(catalog: &TomlSourceCatalog, handle: &str) -> Result<()> {
    let mut sources = catalog.load().await.context("Failed to load source catalog")?;
    let before = sources.len();

    let wanted = handle.trim();
    sources.retain(|s| !s.handle.eq_ignore_ascii_case(wanted));

    if sources.len() == before {
        bail!("No source with handle '{}'", wanted);
    }

    catalog
        .save(&sources)
        .await
        .with_context(|| format!("Failed to save {}", catalog.path().display()))?;

    tracing::info!(handle = %wanted, "Source removed");
    println!("Removed {}", wanted);
    Ok(())
}
