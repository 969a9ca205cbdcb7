//! Archive command - browse sent newsletters

use anyhow::{Context, Result};
use digest_press_adapters::store::FsDigestArchive;
use digest_press_domain::DigestArchive;
use std::path::PathBuf;

use crate::args::{ArchiveArgs, ArchiveCommands};
use crate::config::AppConfig;

pub async fn execute(args: ArchiveArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let archive = FsDigestArchive::new(&config.general.archive_dir);

    match args.command {
        ArchiveCommands::List { json } => {
            let records = archive.list().await.context("Failed to read archive")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
                return Ok(());
            }

            if records.is_empty() {
                println!("No newsletters sent yet.");
                return Ok(());
            }

            println!("Sent newsletters ({})", records.len());
            println!("================");
            for record in &records {
                println!(
                    "{}  {} articles  to {} via {}",
                    record.manifest.date,
                    record.manifest.article_count,
                    record.delivered_to,
                    record.channel
                );
                for title in &record.manifest.article_titles {
                    println!("    - {}", title);
                }
                println!("    {}", record.files.html_file);
            }
            Ok(())
        }
    }
}
