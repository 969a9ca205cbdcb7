//! Configuration loading and management

use anyhow::{Context, Result};
use digest_press_adapters::delivery::SmtpSecurity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub youtube: YoutubeConfig,

    #[serde(default)]
    pub podcast: PodcastConfig,

    #[serde(default)]
    pub transcript: TranscriptConfig,

    #[serde(default)]
    pub rewrite: RewriteConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub newsletter: NewsletterConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_sources_file")]
    pub sources_file: PathBuf,

    #[serde(default = "default_template_file")]
    pub template_file: PathBuf,

    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    #[serde(default = "default_lock_file")]
    pub lock_file: PathBuf,

    /// A lock older than this is assumed to belong to a crashed run
    #[serde(default = "default_lock_stale_hours")]
    pub lock_stale_hours: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_backend")]
    pub backend: LedgerBackend,

    /// JSON file or SQLite database, depending on the backend
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    #[serde(default = "default_max_items_per_source")]
    pub max_items_per_source: usize,

    /// Pause between items, to stay polite with the transcript service
    #[serde(default = "default_item_pause_secs")]
    pub item_pause_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    #[serde(default = "default_youtube_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default = "default_supadata_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(default = "default_description_limit")]
    pub description_limit: usize,

    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    #[serde(default = "default_anthropic_api_key_env")]
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsletterConfig {
    #[serde(default = "default_newsletter_title")]
    pub title: String,

    /// Empty means "send to the SMTP account itself"
    #[serde(default)]
    pub recipient: String,

    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    Smtp,
    Outbox,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_delivery_channel")]
    pub channel: DeliveryChannel,

    #[serde(default = "default_outbox_dir")]
    pub outbox_dir: PathBuf,

    #[serde(default)]
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub security: SmtpSecurity,

    #[serde(default = "default_newsletter_title")]
    pub from_name: String,

    #[serde(default = "default_smtp_username_env")]
    pub username_env: String,

    #[serde(default = "default_smtp_password_env")]
    pub password_env: String,

    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_sources_file() -> PathBuf {
    PathBuf::from("./sources.toml")
}

fn default_template_file() -> PathBuf {
    PathBuf::from("./prompt.md")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./newsletters")
}

fn default_lock_file() -> PathBuf {
    PathBuf::from("./digest-press.lock")
}

fn default_lock_stale_hours() -> i64 {
    6
}

fn default_ledger_backend() -> LedgerBackend {
    LedgerBackend::Json
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("./processed_videos.json")
}

fn default_lookback_days() -> i64 {
    7
}

fn default_max_items_per_source() -> usize {
    10
}

fn default_item_pause_secs() -> u64 {
    1
}

fn default_youtube_api_key_env() -> String {
    "YOUTUBE_API_KEY".to_string()
}

fn default_true() -> bool {
    true
}

fn default_supadata_api_key_env() -> String {
    "SUPADATA_API_KEY".to_string()
}

fn default_description_limit() -> usize {
    2000
}

fn default_min_chars() -> usize {
    1
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_timeout() -> u64 {
    300
}

fn default_max_output_tokens() -> u32 {
    8192
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_anthropic_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_openai_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_newsletter_title() -> String {
    "Digest Press".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_delivery_channel() -> DeliveryChannel {
    DeliveryChannel::Smtp
}

fn default_outbox_dir() -> PathBuf {
    PathBuf::from("./outbox")
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    465
}

fn default_smtp_username_env() -> String {
    "GMAIL_ADDRESS".to_string()
}

fn default_smtp_password_env() -> String {
    "GMAIL_APP_PASSWORD".to_string()
}

fn default_smtp_timeout() -> u64 {
    60
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            sources_file: default_sources_file(),
            template_file: default_template_file(),
            archive_dir: default_archive_dir(),
            lock_file: default_lock_file(),
            lock_stale_hours: default_lock_stale_hours(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: default_ledger_backend(),
            path: default_ledger_path(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            max_items_per_source: default_max_items_per_source(),
            item_pause_secs: default_item_pause_secs(),
        }
    }
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_youtube_api_key_env(),
        }
    }
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_supadata_api_key_env(),
        }
    }
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            description_limit: default_description_limit(),
            min_chars: default_min_chars(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
            max_output_tokens: default_max_output_tokens(),
            gemini: GeminiConfig::default(),
            anthropic: AnthropicConfig::default(),
            openai: OpenAiConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_api_key_env(),
        }
    }
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_anthropic_api_key_env(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_api_key_env(),
            base_url: default_openai_base_url(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
        }
    }
}

impl Default for NewsletterConfig {
    fn default() -> Self {
        Self {
            title: default_newsletter_title(),
            recipient: String::new(),
            language: default_language(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            channel: default_delivery_channel(),
            outbox_dir: default_outbox_dir(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            security: SmtpSecurity::default(),
            from_name: default_newsletter_title(),
            username_env: default_smtp_username_env(),
            password_env: default_smtp_password_env(),
            timeout_secs: default_smtp_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./config.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DIGEST_PRESS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Generate example configuration as TOML string
    pub fn example_toml() -> String {
        r#"# digest-press configuration
#
# Every key can be overridden from the environment, e.g.
#   DIGEST_PRESS__LLM__PROVIDER=anthropic
# Secrets are never stored here; the *_env keys name the variables holding them.

[general]
sources_file = "./sources.toml"
template_file = "./prompt.md"
archive_dir = "./newsletters"
lock_file = "./digest-press.lock"
lock_stale_hours = 6

[ledger]
backend = "json"  # json, sqlite
path = "./processed_videos.json"

[discovery]
lookback_days = 7
max_items_per_source = 10
item_pause_secs = 1

[youtube]
api_key_env = "YOUTUBE_API_KEY"

[podcast]
enabled = true

[transcript]
api_key_env = "SUPADATA_API_KEY"

[rewrite]
description_limit = 2000
min_chars = 1

[llm]
provider = "gemini"  # gemini, anthropic, openai, ollama, stub
model = "gemini-2.5-flash"
temperature = 0.7
timeout_secs = 300
max_output_tokens = 8192

[llm.gemini]
api_key_env = "GEMINI_API_KEY"

[llm.anthropic]
api_key_env = "ANTHROPIC_API_KEY"

[llm.openai]
api_key_env = "OPENAI_API_KEY"
# Any chat-completions compatible endpoint works here
base_url = "https://api.openai.com/v1"

[llm.ollama]
base_url = "http://localhost:11434"

[newsletter]
title = "Digest Press"
# Leave empty to send the digest to the SMTP account itself
recipient = ""
language = "en"

[delivery]
channel = "smtp"  # smtp, outbox
outbox_dir = "./outbox"

[delivery.smtp]
host = "smtp.gmail.com"
port = 465
security = "tls"  # tls (implicit, port 465), starttls (port 587)
from_name = "Digest Press"
username_env = "GMAIL_ADDRESS"
password_env = "GMAIL_APP_PASSWORD"
timeout_secs = 60
"#
        .to_string()
    }
}
