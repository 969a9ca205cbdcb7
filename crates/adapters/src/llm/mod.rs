//! LLM provider adapters

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod stub;

pub use anthropic::AnthropicRewriter;
pub use gemini::GeminiRewriter;
pub use ollama::OllamaRewriter;
pub use openai::OpenAiRewriter;
pub use stub::StubRewriter;

use digest_press_domain::RewriteError;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// System instruction sent alongside every rewrite prompt
const SYSTEM_INSTRUCTION: &str =
    "You are a magazine writer. Answer with the finished article in Markdown and nothing else.";

/// Common LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// Sampling temperature
    pub temperature: f64,
    /// Maximum output tokens; long-form articles need room
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 8192,
            timeout_secs: 300,
        }
    }
}

fn build_client(config: &LlmConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
}

fn map_send_error(error: reqwest::Error) -> RewriteError {
    if error.is_timeout() {
        RewriteError::Timeout
    } else {
        RewriteError::Api(error.to_string())
    }
}

/// Pass successful responses through; 429 and other failures become errors
async fn check_status(response: Response) -> Result<Response, RewriteError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(RewriteError::RateLimited);
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RewriteError::Api(format!(
            "API returned {}: {}",
            status, body
        )));
    }

    Ok(response)
}

/// Reject output that stopped at the token limit rather than finishing
fn not_truncated(finish_reason: Option<&str>, limit_reason: &str) -> Result<(), RewriteError> {
    match finish_reason {
        Some(reason) if reason.eq_ignore_ascii_case(limit_reason) => Err(
            RewriteError::InvalidFormat(format!("output truncated at the token limit ({})", reason)),
        ),
        _ => Ok(()),
    }
}

fn non_empty(text: String) -> Result<String, RewriteError> {
    if text.trim().is_empty() {
        return Err(RewriteError::EmptyOutput);
    }
    Ok(text)
}
