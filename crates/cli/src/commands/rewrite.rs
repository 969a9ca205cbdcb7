//! Rewrite command - one-shot transcript rewrite

use anyhow::{Context, Result, bail};
use digest_press_adapters::{
    llm::{
        AnthropicRewriter, GeminiRewriter, LlmConfig as AdapterLlmConfig, OllamaRewriter,
        OpenAiRewriter, StubRewriter,
    },
    secrets::EnvCredential,
    store::FsTemplateStore,
};
use digest_press_domain::usecases::{RewriteConfig, RewriteEngine};
use digest_press_domain::{Rewriter, TemplateFields, TemplateStore, policy::ArticlePolicy};
use std::io::{self, Read};
use std::path::PathBuf;
use time::OffsetDateTime;

use crate::args::RewriteArgs;
use crate::config::AppConfig;

pub async fn execute(args: RewriteArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let transcript = get_transcript(&args)?;
    if transcript.trim().is_empty() {
        bail!("No transcript provided");
    }

    let template = FsTemplateStore::new(&config.general.template_file)
        .load()
        .await
        .context("Failed to load instruction template")?;

    let rewriter = build_rewriter(&config)?;
    let engine = RewriteEngine::new(&*rewriter, rewrite_config_from_config(&config));

    let published = OffsetDateTime::now_utc().date().to_string();
    let fields = TemplateFields {
        title: &args.title,
        source: &args.source,
        url: &args.url,
        description: &args.description,
        transcript: &transcript,
        published: &published,
    };

    let article = engine
        .write(fields, &template)
        .await
        .context("Rewrite failed")?;

    println!("{}", article);
    Ok(())
}

pub(crate) fn build_rewriter(config: &AppConfig) -> Result<Box<dyn Rewriter>> {
    let llm_config = adapter_llm_config(&config.llm);

    match config.llm.provider.as_str() {
        "gemini" => {
            let api_key = EnvCredential::from_env(&config.llm.gemini.api_key_env);
            Ok(Box::new(
                GeminiRewriter::new(api_key, llm_config)
                    .context("Failed to build Gemini client")?,
            ))
        }
        "anthropic" => {
            let api_key = EnvCredential::from_env(&config.llm.anthropic.api_key_env);
            Ok(Box::new(
                AnthropicRewriter::new(api_key, llm_config)
                    .context("Failed to build Anthropic client")?,
            ))
        }
        "openai" => {
            let base_url = config.llm.openai.base_url.trim();
            if base_url.is_empty() {
                bail!("OpenAI base_url is required");
            }
            let api_key = EnvCredential::from_env(&config.llm.openai.api_key_env);
            Ok(Box::new(
                OpenAiRewriter::with_base_url(api_key, base_url.to_string(), llm_config)
                    .context("Failed to build OpenAI client")?,
            ))
        }
        "ollama" => {
            let base_url = config.llm.ollama.base_url.trim();
            let rewriter = if base_url.is_empty() {
                OllamaRewriter::new(llm_config)
            } else {
                OllamaRewriter::with_base_url(base_url.to_string(), llm_config)
            };
            Ok(Box::new(
                rewriter.context("Failed to build Ollama client")?,
            ))
        }
        "stub" => Ok(Box::new(StubRewriter::echo())),
        other => bail!("Unknown LLM provider: {}", other),
    }
}

/// Env var holding the key of the configured provider, if it needs one
pub(crate) fn provider_key_env(config: &AppConfig) -> Option<&str> {
    match config.llm.provider.as_str() {
        "gemini" => Some(&config.llm.gemini.api_key_env),
        "anthropic" => Some(&config.llm.anthropic.api_key_env),
        "openai" => Some(&config.llm.openai.api_key_env),
        _ => None,
    }
}

fn adapter_llm_config(config: &crate::config::LlmConfig) -> AdapterLlmConfig {
    AdapterLlmConfig {
        model: config.model.clone(),
        temperature: config.temperature,
        max_output_tokens: config.max_output_tokens,
        timeout_secs: config.timeout_secs,
    }
}

pub(crate) fn rewrite_config_from_config(config: &AppConfig) -> RewriteConfig {
    RewriteConfig {
        description_limit: config.rewrite.description_limit,
        policy: ArticlePolicy {
            min_chars: config.rewrite.min_chars,
            ..ArticlePolicy::default()
        },
    }
}

fn get_transcript(args: &RewriteArgs) -> Result<String> {
    if let Some(ref text) = args.text {
        return Ok(text.clone());
    }

    if let Some(ref path) = args.file {
        if path.as_os_str() == "-" {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read from stdin")?;
            return Ok(text);
        }

        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()));
    }

    bail!("Provide the transcript with --text or --file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rewriter_selects_stub_provider() {
        let mut config = AppConfig::default();
        config.llm.provider = "stub".to_string();

        let rewriter = build_rewriter(&config).unwrap();
        assert_eq!(rewriter.provider(), "stub");
    }

    #[test]
    fn build_rewriter_rejects_unknown_provider() {
        let mut config = AppConfig::default();
        config.llm.provider = "carrier-pigeon".to_string();

        let err = build_rewriter(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }

    #[test]
    fn build_rewriter_defers_missing_key_to_call_time() {
        let mut config = AppConfig::default();
        config.llm.gemini.api_key_env = "DIGEST_PRESS_TEST_UNSET_GEMINI_KEY".to_string();

        let rewriter = build_rewriter(&config).unwrap();
        assert_eq!(rewriter.provider(), "gemini");
    }

    #[tokio::test]
    async fn stub_rewrite_applies_article_policy() {
        let mut config = AppConfig::default();
        config.llm.provider = "stub".to_string();
        config.rewrite.min_chars = 1;

        let rewriter = build_rewriter(&config).unwrap();
        let engine = RewriteEngine::new(&*rewriter, rewrite_config_from_config(&config));
        let template = digest_press_domain::InstructionTemplate::new("Write about {{title}}");

        let fields = TemplateFields {
            title: "Rust",
            source: "Ferris",
            url: "",
            description: "",
            transcript: "",
            published: "2024-01-01",
        };
        let body = engine.write(fields, &template).await.unwrap();
        assert!(body.contains("Rust"));
    }
}
