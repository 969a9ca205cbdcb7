//! Supadata transcript service

use async_trait::async_trait;
use digest_press_domain::{Item, SourceKind, TranscriptOutcome, TranscriptSource};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::secrets::EnvCredential;

const DEFAULT_BASE_URL: &str = "https://api.supadata.ai";

pub struct SupadataTranscripts {
    client: Client,
    api_key: EnvCredential,
    base_url: String,
}

impl SupadataTranscripts {
    pub fn new(api_key: EnvCredential) -> Result<Self, reqwest::Error> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: EnvCredential, base_url: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    /// The URL handed to the service: the page for videos, the audio for episodes
    fn target_url(item: &Item) -> &str {
        match item.source.kind {
            SourceKind::Youtube => &item.url,
            SourceKind::Podcast => item.media_url.as_deref().unwrap_or(&item.url),
        }
    }

    async fn request(&self, item: &Item) -> TranscriptOutcome {
        let key = match self.api_key.expose() {
            Ok(key) => key,
            Err(e) => return TranscriptOutcome::Failed(e.to_string()),
        };

        let url = format!("{}/v1/transcript", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", key)
            .query(&[("url", Self::target_url(item)), ("text", "true")])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return TranscriptOutcome::Failed("request timed out".to_string());
            }
            Err(e) => return TranscriptOutcome::Failed(format!("network error: {}", e)),
        };

        match response.status() {
            StatusCode::OK => match response.json::<TranscriptResponse>().await {
                Ok(body) => match body.into_text() {
                    Some(text) => TranscriptOutcome::Text(text),
                    None => TranscriptOutcome::NotAvailable("empty transcript".to_string()),
                },
                Err(e) => TranscriptOutcome::Failed(format!("invalid response: {}", e)),
            },
            StatusCode::ACCEPTED => {
                TranscriptOutcome::NotAvailable("transcript is still being generated".to_string())
            }
            StatusCode::NOT_FOUND => {
                TranscriptOutcome::NotAvailable("no transcript for this item".to_string())
            }
            StatusCode::TOO_MANY_REQUESTS => TranscriptOutcome::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                TranscriptOutcome::Failed("API key rejected".to_string())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let detail: String = body.chars().take(200).collect();
                TranscriptOutcome::Failed(format!("service returned {}: {}", status, detail))
            }
        }
    }
}

#[derive(Deserialize)]
struct TranscriptResponse {
    content: Option<String>,
    #[serde(default)]
    transcript: Vec<Segment>,
}

#[derive(Deserialize)]
struct Segment {
    #[serde(default)]
    text: String,
}

impl TranscriptResponse {
    /// Plain content when present, otherwise the segments joined with spaces
    fn into_text(self) -> Option<String> {
        let text = match self.content {
            Some(content) if !content.trim().is_empty() => content,
            _ => self
                .transcript
                .into_iter()
                .map(|segment| segment.text)
                .filter(|text| !text.trim().is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        };

        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[async_trait]
impl TranscriptSource for SupadataTranscripts {
    async fn fetch(&self, item: &Item) -> TranscriptOutcome {
        tracing::debug!(item_id = %item.id, url = %Self::target_url(item), "Requesting transcript");

        let outcome = self.request(item).await;
        tracing::debug!(item_id = %item.id, outcome = %outcome.describe(), "Transcript response");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest_press_domain::Source;
    use secrecy::SecretString;
    use time::macros::datetime;
    use tracing_test::traced_test;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transcripts(server: &MockServer) -> SupadataTranscripts {
        SupadataTranscripts::with_base_url(
            EnvCredential::new("SUPADATA_API_KEY", SecretString::new("sd-key".into())),
            server.uri(),
        )
        .unwrap()
    }

    fn video() -> Item {
        Item {
            id: "abc123".to_string(),
            title: "A talk".to_string(),
            source: Source::new("@channel", SourceKind::Youtube),
            source_name: "Channel".to_string(),
            url: "https://www.youtube.com/watch?v=abc123".to_string(),
            description: String::new(),
            published_at: datetime!(2026-10-15 10:00 UTC),
            media_url: None,
        }
    }

    async fn respond_with(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/v1/transcript"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_content_field_is_returned() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/transcript"))
            .and(header("x-api-key", "sd-key"))
            .and(query_param("url", "https://www.youtube.com/watch?v=abc123"))
            .and(query_param("text", "true"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"content": "  hello world  ", "lang": "en"})),
            )
            .mount(&server)
            .await;

        let outcome = transcripts(&server).fetch(&video()).await;
        assert_eq!(outcome, TranscriptOutcome::Text("hello world".to_string()));
    }

    #[tokio::test]
    async fn test_segments_are_joined() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "transcript": [{"text": "first", "offset": 0}, {"text": "second", "offset": 1200}]
            })),
        )
        .await;

        let outcome = transcripts(&server).fetch(&video()).await;
        assert_eq!(outcome, TranscriptOutcome::Text("first second".to_string()));
    }

    #[tokio::test]
    async fn test_podcast_uses_media_url() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/transcript"))
            .and(query_param("url", "https://media.example.com/ep.m4a"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": "audio"})))
            .mount(&server)
            .await;

        let episode = Item {
            source: Source::new("5e280fab418a84a0461fa8d5", SourceKind::Podcast),
            media_url: Some("https://media.example.com/ep.m4a".to_string()),
            ..video()
        };

        let outcome = transcripts(&server).fetch(&episode).await;
        assert_eq!(outcome, TranscriptOutcome::Text("audio".to_string()));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (404, "NotAvailable"),
            (202, "NotAvailable"),
            (429, "RateLimited"),
            (401, "Failed"),
            (500, "Failed"),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            respond_with(&server, ResponseTemplate::new(status)).await;

            let outcome = transcripts(&server).fetch(&video()).await;
            let actual = match outcome {
                TranscriptOutcome::Text(_) => "Text",
                TranscriptOutcome::NotAvailable(_) => "NotAvailable",
                TranscriptOutcome::RateLimited => "RateLimited",
                TranscriptOutcome::Failed(_) => "Failed",
            };
            assert_eq!(actual, expected, "status {}", status);
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_failures_are_logged_at_debug_only() {
        let server = MockServer::start().await;
        respond_with(&server, ResponseTemplate::new(500)).await;

        let outcome = transcripts(&server).fetch(&video()).await;
        assert!(matches!(outcome, TranscriptOutcome::Failed(_)));

        assert!(logs_contain("Transcript response"));
        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .find(|line| line.contains(" ERROR ") || line.contains(" WARN ") || line.contains(" INFO "))
            {
                Some(line) => Err(format!("transcript adapter logged above debug: {}", line)),
                None => Ok(()),
            }
        });
    }

    #[tokio::test]
    async fn test_empty_content_is_not_available() {
        let server = MockServer::start().await;
        respond_with(
            &server,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"content": "   "})),
        )
        .await;

        let outcome = transcripts(&server).fetch(&video()).await;
        assert!(matches!(outcome, TranscriptOutcome::NotAvailable(_)));
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let server = MockServer::start().await;
        let transcripts = SupadataTranscripts::with_base_url(
            EnvCredential::missing("SUPADATA_API_KEY"),
            server.uri(),
        )
        .unwrap();

        let outcome = transcripts.fetch(&video()).await;
        assert_eq!(
            outcome,
            TranscriptOutcome::Failed("Environment variable SUPADATA_API_KEY is not set".to_string())
        );
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
