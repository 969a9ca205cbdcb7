//! Ledger command - inspect or reset processed items

use anyhow::{Context, Result, bail};
use digest_press_adapters::store::FileRunLock;
use digest_press_domain::{RunLock, RunLockError};
use std::path::PathBuf;
use time::format_description::well_known::Rfc3339;

use crate::args::{LedgerArgs, LedgerCommands};
use crate::commands::run::build_ledger;
use crate::config::AppConfig;

pub async fn execute(args: LedgerArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let ledger = build_ledger(&config).await?;

    match args.command {
        LedgerCommands::List { json } => {
            let records = ledger.entries().await.context("Failed to read ledger")?;

            if json {
                let output = serde_json::json!({
                    "count": records.len(),
                    "items": records,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }

            println!("Processed items ({})", records.len());
            println!("===============");
            for record in &records {
                let when = record
                    .entry
                    .processed_at
                    .format(&Rfc3339)
                    .unwrap_or_default();
                println!("  {}  {}  {}", when, record.item_id, record.entry.title);
                println!("      {}", record.entry.source);
            }
            Ok(())
        }
        LedgerCommands::Clear { yes } => {
            if !yes {
                bail!("Refusing to clear the ledger without --yes; every item would be processed again");
            }

            // A live run would write its cached entries back over the reset
            let lock = FileRunLock::new(
                &config.general.lock_file,
                time::Duration::hours(config.general.lock_stale_hours),
            );
            match lock.acquire().await {
                Ok(()) => {}
                Err(RunLockError::Held(since)) => {
                    bail!("Cannot clear the ledger: a run is in progress (since {})", since)
                }
                Err(e) => return Err(e).context("Failed to lock the ledger"),
            }

            let cleared = ledger.clear().await.context("Failed to clear ledger");
            lock.release().await.context("Failed to release run lock")?;
            let removed = cleared?;
            tracing::info!(removed, path = %config.ledger.path.display(), "Ledger cleared");
            println!("Cleared {} processed items", removed);
            Ok(())
        }
    }
}
