//! Doctor command - validate configuration and show status

use anyhow::Result;
use digest_press_adapters::store::{FsTemplateStore, TomlSourceCatalog};
use digest_press_domain::{SourceCatalog, SourceKind, TemplateStore};
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::commands::rewrite::provider_key_env;
use crate::config::{AppConfig, DeliveryChannel};

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    sources: CheckResult,
    template: CheckResult,
    youtube: CheckResult,
    transcript: CheckResult,
    llm: CheckResult,
    delivery: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        sources: CheckResult::error("Not checked"),
        template: CheckResult::error("Not checked"),
        youtube: CheckResult::error("Not checked"),
        transcript: CheckResult::error("Not checked"),
        llm: CheckResult::error("Not checked"),
        delivery: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    let mut youtube_sources = 0;
    if let Some(ref config) = config {
        let (check, youtube) = check_sources(config).await;
        report.sources = check;
        youtube_sources = youtube;

        report.template = check_template(config).await;
        report.youtube = check_youtube(config, youtube_sources);
        report.transcript = check_env_key("Supadata", &config.transcript.api_key_env, true);
        report.llm = check_llm(config);
        report.delivery = check_delivery(config);
    }

    // Determine overall status
    let checks = [
        &report.config,
        &report.sources,
        &report.template,
        &report.youtube,
        &report.transcript,
        &report.llm,
        &report.delivery,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    tracing::debug!(overall = %report.overall, youtube_sources, "Doctor checks complete");

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

/// Returns the check and the number of YouTube sources
async fn check_sources(config: &AppConfig) -> (CheckResult, usize) {
    let catalog = TomlSourceCatalog::new(&config.general.sources_file);

    match catalog.load().await {
        Ok(sources) if sources.is_empty() => (
            CheckResult::warn(format!(
                "No sources in {}; add one with `digest-press sources add`",
                catalog.path().display()
            )),
            0,
        ),
        Ok(sources) => {
            let youtube = sources
                .iter()
                .filter(|s| s.kind == SourceKind::Youtube)
                .count();
            let podcasts = sources.len() - youtube;

            let check = if podcasts > 0 && !config.podcast.enabled {
                CheckResult::warn(format!(
                    "{} podcast sources configured but podcast discovery is disabled",
                    podcasts
                ))
            } else {
                CheckResult::ok(format!(
                    "{} sources ({} YouTube, {} podcast)",
                    sources.len(),
                    youtube,
                    podcasts
                ))
            };

            let details = serde_json::json!({
                "count": sources.len(),
                "handles": sources.iter().map(|s| &s.handle).collect::<Vec<_>>()
            });
            (check.with_details(details), youtube)
        }
        Err(e) => (
            CheckResult::error(format!("Failed to load source catalog: {}", e)),
            0,
        ),
    }
}

async fn check_template(config: &AppConfig) -> CheckResult {
    let store = FsTemplateStore::new(&config.general.template_file);

    let template = match store.load().await {
        Ok(template) => template,
        Err(e) => return CheckResult::error(format!("Failed to load template: {}", e)),
    };

    let origin = if store.is_customized() {
        store.path().display().to_string()
    } else {
        "built-in default".to_string()
    };

    match template.validate() {
        Ok(()) => CheckResult::ok(format!("Template: {}", origin)).with_details(
            serde_json::json!({
                "hash": template.hash(),
                "placeholders": template.placeholders(),
            }),
        ),
        Err(e) => CheckResult::error(format!("Template {} is invalid: {}", origin, e)),
    }
}

fn check_youtube(config: &AppConfig, youtube_sources: usize) -> CheckResult {
    check_env_key("YouTube", &config.youtube.api_key_env, youtube_sources > 0)
}

/// Check an API key env var without revealing its value
fn check_env_key(name: &str, env_var: &str, needed: bool) -> CheckResult {
    if env_var.trim().is_empty() {
        return CheckResult::error(format!("No {} API key env var configured", name));
    }

    match std::env::var(env_var) {
        Ok(val) if !val.trim().is_empty() => {
            CheckResult::ok(format!("{} API key: {} (set)", name, env_var))
        }
        _ if needed => CheckResult::warn(format!("{} API key: {} (not set)", name, env_var)),
        _ => CheckResult::ok(format!("{} API key: {} (not set, not needed)", name, env_var)),
    }
}

fn check_llm(config: &AppConfig) -> CheckResult {
    let provider = &config.llm.provider;
    let model = &config.llm.model;

    match provider.as_str() {
        "ollama" => {
            return CheckResult::ok(format!(
                "Provider: ollama, Model: {}, base_url: {}",
                model, config.llm.ollama.base_url
            ));
        }
        "stub" => return CheckResult::ok("Provider: stub (offline)"),
        "gemini" | "anthropic" | "openai" => {}
        other => return CheckResult::error(format!("Unknown provider: {}", other)),
    }

    let Some(api_key_env) = provider_key_env(config) else {
        return CheckResult::error(format!("No API key env var configured for {}", provider));
    };

    if api_key_env.is_empty() {
        return CheckResult::error(format!("No API key env var configured for {}", provider));
    }

    match std::env::var(api_key_env) {
        Ok(val) if !val.is_empty() => CheckResult::ok(format!(
            "Provider: {}, Model: {}, API key: {} (set)",
            provider, model, api_key_env
        )),
        _ => CheckResult::warn(format!(
            "Provider: {}, Model: {}, API key: {} (not set)",
            provider, model, api_key_env
        )),
    }
}

fn check_delivery(config: &AppConfig) -> CheckResult {
    if config.delivery.channel == DeliveryChannel::Outbox {
        return CheckResult::ok(format!(
            "Outbox: {}",
            config.delivery.outbox_dir.display()
        ));
    }

    let smtp = &config.delivery.smtp;
    let is_set = |var: &str| std::env::var(var).is_ok_and(|v| !v.trim().is_empty());

    let missing: Vec<&str> = [smtp.username_env.as_str(), smtp.password_env.as_str()]
        .into_iter()
        .filter(|var| !is_set(*var))
        .collect();

    let recipient = if config.newsletter.recipient.trim().is_empty() {
        format!("${}", smtp.username_env)
    } else {
        config.newsletter.recipient.clone()
    };

    if missing.is_empty() {
        CheckResult::ok(format!(
            "SMTP {}:{} ({:?}), recipient: {}",
            smtp.host, smtp.port, smtp.security, recipient
        ))
    } else {
        CheckResult::warn(format!(
            "SMTP {}:{}, credentials not set: {}",
            smtp.host,
            smtp.port,
            missing.join(", ")
        ))
    }
}

fn print_report(report: &DoctorReport) {
    println!("digest-press Doctor Report");
    println!("==========================");
    println!();

    print_check("Config", &report.config);
    print_check("Sources", &report.sources);
    print_check("Template", &report.template);
    print_check("YouTube", &report.youtube);
    print_check("Transcripts", &report.transcript);
    print_check("LLM Provider", &report.llm);
    print_check("Delivery", &report.delivery);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: digest-press run --outbox ./outbox");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
