//! Ollama local LLM adapter

use async_trait::async_trait;
use digest_press_domain::{RewriteError, Rewriter};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{
    LlmConfig, SYSTEM_INSTRUCTION, build_client, check_status, map_send_error, non_empty,
    not_truncated,
};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Rewriter backed by a local Ollama server; needs no credentials
pub struct OllamaRewriter {
    client: Client,
    base_url: String,
    config: LlmConfig,
}

impl OllamaRewriter {
    pub fn new(config: LlmConfig) -> Result<Self, reqwest::Error> {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), config)
    }

    pub fn with_base_url(base_url: String, config: LlmConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(&config)?,
            base_url,
            config,
        })
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: i64,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    done_reason: Option<String>,
}

#[async_trait]
impl Rewriter for OllamaRewriter {
    async fn generate(&self, prompt: &str) -> Result<String, RewriteError> {
        let request = OllamaRequest {
            model: &self.config.model,
            prompt,
            system: SYSTEM_INSTRUCTION,
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: i64::from(self.config.max_output_tokens),
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let api_response: OllamaResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| RewriteError::InvalidFormat(e.to_string()))?;

        not_truncated(api_response.done_reason.as_deref(), "length")?;
        non_empty(api_response.response)
    }

    fn provider(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_generate_without_streaming() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({"model": "qwen3:14b", "stream": false})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "Local article", "done": true})),
            )
            .mount(&server)
            .await;

        let rewriter = OllamaRewriter::with_base_url(
            server.uri(),
            LlmConfig {
                model: "qwen3:14b".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(rewriter.generate("prompt").await.unwrap(), "Local article");
    }
}
