//! Template command - show, replace, reset and validate the instruction template

use anyhow::{Context, Result};
use digest_press_adapters::store::FsTemplateStore;
use digest_press_domain::{InstructionTemplate, TemplateStore};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::args::{TemplateArgs, TemplateCommands};
use crate::config::AppConfig;

pub async fn execute(args: TemplateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let store = FsTemplateStore::new(&config.general.template_file);

    match args.command {
        TemplateCommands::Show => show_template(&store).await,
        TemplateCommands::Set { file } => set_template(&store, &file).await,
        TemplateCommands::Reset => {
            store.reset().await.context("Failed to reset template")?;
            println!("Template reset to the built-in default");
            Ok(())
        }
        TemplateCommands::Validate => validate_template(&store).await,
    }
}

async fn show_template(store: &FsTemplateStore) -> Result<()> {
    let template = store.load().await.context("Failed to load template")?;

    if store.is_customized() {
        tracing::debug!(path = %store.path().display(), "Showing custom template");
    } else {
        tracing::debug!("Showing built-in template");
    }

    println!("{}", template.text());
    Ok(())
}

async fn set_template(store: &FsTemplateStore, file: &Path) -> Result<()> {
    let text = if file.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read from stdin")?;
        text
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read file: {}", file.display()))?
    };

    let template = InstructionTemplate::new(text);
    store
        .save(&template)
        .await
        .context("Template rejected")?;

    println!(
        "✓ Template saved to {} (placeholders: {})",
        store.path().display(),
        template.placeholders().join(", ")
    );
    Ok(())
}

async fn validate_template(store: &FsTemplateStore) -> Result<()> {
    let template = store.load().await.context("Failed to load template")?;
    let origin = if store.is_customized() {
        store.path().display().to_string()
    } else {
        "built-in default".to_string()
    };

    println!("Validating template: {}", origin);

    match template.validate() {
        Ok(()) => {
            println!(
                "✓ Validation passed (placeholders: {})",
                template.placeholders().join(", ")
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Validation failed: {}", e);
            std::process::exit(1);
        }
    }
}
