//! OpenAI chat-completions adapter
//!
//! Works against any provider exposing the same `/chat/completions`
//! endpoint (OpenRouter, DeepSeek, vLLM...) by pointing `base_url` at it.

use async_trait::async_trait;
use digest_press_domain::{RewriteError, Rewriter};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    LlmConfig, SYSTEM_INSTRUCTION, build_client, check_status, map_send_error, non_empty,
    not_truncated,
};
use crate::secrets::EnvCredential;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiRewriter {
    client: Client,
    api_key: EnvCredential,
    base_url: String,
    config: LlmConfig,
}

impl OpenAiRewriter {
    pub fn new(api_key: EnvCredential, config: LlmConfig) -> Result<Self, reqwest::Error> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string(), config)
    }

    pub fn with_base_url(
        api_key: EnvCredential,
        base_url: String,
        config: LlmConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(&config)?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl Rewriter for OpenAiRewriter {
    async fn generate(&self, prompt: &str) -> Result<String, RewriteError> {
        let key = self
            .api_key
            .expose()
            .map_err(|e| RewriteError::Config(e.to_string()))?;

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_output_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let api_response: ChatCompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RewriteError::InvalidFormat(e.to_string()))?;

        for choice in &api_response.choices {
            not_truncated(choice.finish_reason.as_deref(), "length")?;
        }

        let text = api_response
            .choices
            .into_iter()
            .filter_map(|c| c.message.content)
            .collect::<Vec<_>>()
            .join("");

        non_empty(text)
    }

    fn provider(&self) -> &'static str {
        "openai"
    }
}
