//! Config command - write a starter configuration

use anyhow::{Context, Result};
use std::path::Path;

use crate::args::{ConfigArgs, ConfigCommands};
use crate::commands::rewrite::provider_key_env;
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => init_config(&path, force).await,
    }
}

async fn init_config(path: &Path, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(path).await.unwrap_or(false) {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            path.display()
        );
    }

    let content = AppConfig::example_toml();
    let config: AppConfig =
        toml::from_str(&content).context("Built-in example config does not parse")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    tokio::fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    tracing::info!(path = %path.display(), overwritten = force, "Config file written");

    println!("Created config file: {}", path.display());

    let unset = unset_key_vars(&config);
    if !unset.is_empty() {
        println!();
        println!("These variables are not set yet:");
        for var in &unset {
            println!("  export {}=...", var);
        }
    }

    let config_flag = config_flag(path);
    println!();
    println!("Next steps:");
    println!("  1. Follow a channel: digest-press{} sources add https://www.youtube.com/@channel", config_flag);
    println!("  2. Check the setup: digest-press{} doctor", config_flag);
    println!("  3. Preview a digest without mail: digest-press{} run --outbox ./outbox", config_flag);

    Ok(())
}

/// Key variables named by `config` that are missing from the environment
fn unset_key_vars(config: &AppConfig) -> Vec<String> {
    let smtp = &config.delivery.smtp;
    let mut vars = vec![
        config.youtube.api_key_env.as_str(),
        config.transcript.api_key_env.as_str(),
        smtp.username_env.as_str(),
        smtp.password_env.as_str(),
    ];
    vars.extend(provider_key_env(config));

    vars.into_iter()
        .filter(|var| !var.is_empty())
        .filter(|var| std::env::var(var).map_or(true, |v| v.trim().is_empty()))
        .map(str::to_string)
        .collect()
}

/// `--config` is only needed when the file is not the default `./config.toml`
fn config_flag(path: &Path) -> String {
    if path == Path::new("config.toml") || path == Path::new("./config.toml") {
        String::new()
    } else {
        format!(" --config {}", path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_vars_lists_provider_key() {
        let mut config = AppConfig::default();
        config.llm.provider = "gemini".to_string();
        config.llm.gemini.api_key_env = "DIGEST_PRESS_TEST_UNSET_GEMINI".to_string();

        let unset = unset_key_vars(&config);
        assert!(unset.contains(&"DIGEST_PRESS_TEST_UNSET_GEMINI".to_string()));
    }

    #[test]
    fn config_flag_only_for_custom_paths() {
        assert_eq!(config_flag(Path::new("./config.toml")), "");
        assert_eq!(
            config_flag(Path::new("/etc/digest-press.toml")),
            " --config /etc/digest-press.toml"
        );
    }
}
