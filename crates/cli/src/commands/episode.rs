//! Episode command - digest of one podcast episode, right now

use anyhow::{Context, Result, bail};
use digest_press_adapters::podcast::parse_episode_id;
use std::path::PathBuf;

use crate::args::EpisodeArgs;
use crate::commands::run::{build_pipeline, build_podcast, finish, report};
use crate::config::AppConfig;

pub async fn execute(args: EpisodeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let Some(episode_id) = parse_episode_id(&args.episode) else {
        bail!(
            "Not a podcast episode URL or id: {}. Expected https://www.xiaoyuzhoufm.com/episode/<id>",
            args.episode
        );
    };

    tracing::info!(episode_id = %episode_id, "Fetching episode");

    let item = build_podcast(&config)?
        .episode(&episode_id)
        .await
        .with_context(|| format!("Failed to fetch episode {}", episode_id))?;

    tracing::info!(
        episode_id = %item.id,
        title = %item.title,
        podcast = %item.source_name,
        "Processing episode"
    );

    let pipeline = build_pipeline(&config, args.outbox).await?;
    let summary = pipeline
        .run_items(vec![item])
        .await
        .context("Run aborted")?;

    report(&summary, args.json)?;
    finish(&summary)
}
