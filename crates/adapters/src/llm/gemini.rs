//! Google Gemini API adapter

use async_trait::async_trait;
use digest_press_domain::{RewriteError, Rewriter};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    LlmConfig, SYSTEM_INSTRUCTION, build_client, check_status, map_send_error, non_empty,
    not_truncated,
};
use crate::secrets::EnvCredential;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini rewriter
pub struct GeminiRewriter {
    client: Client,
    api_key: EnvCredential,
    base_url: String,
    config: LlmConfig,
}

impl GeminiRewriter {
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
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "systemInstruction")]
    system_instruction: Content,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[async_trait]
impl Rewriter for GeminiRewriter {
    async fn generate(&self, prompt: &str) -> Result<String, RewriteError> {
        let key = self
            .api_key
            .expose()
            .map_err(|e| RewriteError::Config(e.to_string()))?;

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
            system_instruction: Content {
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", key)
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let api_response: GeminiResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RewriteError::InvalidFormat(e.to_string()))?;

        for candidate in &api_response.candidates {
            not_truncated(candidate.finish_reason.as_deref(), "MAX_TOKENS")?;
        }

        let text = api_response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        non_empty(text)
    }

    fn provider(&self) -> &'static str {
        "gemini"
    }
}
