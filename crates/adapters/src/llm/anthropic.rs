//! Anthropic Messages API adapter

use async_trait::async_trait;
use digest_press_domain::{RewriteError, Rewriter};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    LlmConfig, SYSTEM_INSTRUCTION, build_client, check_status, map_send_error, non_empty,
    not_truncated,
};
use crate::secrets::EnvCredential;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicRewriter {
    client: Client,
    api_key: EnvCredential,
    base_url: String,
    config: LlmConfig,
}

impl AnthropicRewriter {
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
            base_url,
            config,
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    system: &'a str,
    temperature: f64,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlock {
    r#type: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl Rewriter for AnthropicRewriter {
    async fn generate(&self, prompt: &str) -> Result<String, RewriteError> {
        let key = self
            .api_key
            .expose()
            .map_err(|e| RewriteError::Config(e.to_string()))?;

        let request = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_output_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            system: SYSTEM_INSTRUCTION,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let api_response: AnthropicResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RewriteError::InvalidFormat(e.to_string()))?;

        not_truncated(api_response.stop_reason.as_deref(), "max_tokens")?;

        let text = api_response
            .content
            .into_iter()
            .filter(|block| block.r#type == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        non_empty(text)
    }

    fn provider(&self) -> &'static str {
        "anthropic"
    }
}
