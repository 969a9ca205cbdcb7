//! YouTube Data API v3 discovery adapter

use async_trait::async_trait;
use digest_press_domain::{Discovery, DiscoveryError, Item, Source, SourceKind};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::secrets::EnvCredential;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";

/// Titles the uploads playlist uses for videos that can no longer be watched
const UNAVAILABLE_TITLES: &[&str] = &["Private video", "Deleted video"];

/// Finds recent uploads of a channel through its uploads playlist
pub struct YoutubeDiscovery {
    client: Client,
    api_key: EnvCredential,
    base_url: String,
    max_items: usize,
}

impl YoutubeDiscovery {
    pub fn new(api_key: EnvCredential, max_items: usize) -> Result<Self, reqwest::Error> {
        Self::with_base_url(api_key, max_items, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        api_key: EnvCredential,
        max_items: usize,
        base_url: String,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
            max_items,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, DiscoveryError> {
        let key = self
            .api_key
            .expose()
            .map_err(|e| DiscoveryError::Config(e.to_string()))?;

        let url = format!("{}/youtube/v3/{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::Transient(format!("Request timed out: {}", endpoint))
                } else {
                    DiscoveryError::Transient(format!("Network error: {}", e))
                }
            })?;

        let response = classify_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| DiscoveryError::Transient(format!("Invalid {} response: {}", endpoint, e)))
    }

    /// Channel title and uploads playlist for a handle or channel id
    async fn resolve_channel(&self, handle: &str) -> Result<(String, String), DiscoveryError> {
        let selector = if handle.starts_with("UC") {
            ("id", handle)
        } else {
            ("forHandle", handle)
        };

        let channels: ChannelListResponse = self
            .get("channels", &[("part", "snippet,contentDetails"), selector])
            .await?;

        let channel = channels
            .items
            .into_iter()
            .next()
            .ok_or_else(|| DiscoveryError::NotFound(format!("No channel for {}", handle)))?;

        Ok((
            channel.snippet.title,
            channel.content_details.related_playlists.uploads,
        ))
    }
}

/// Map an HTTP status onto the discovery error taxonomy
async fn classify_status(response: Response) -> Result<Response, DiscoveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail: String = body.chars().take(200).collect();

    Err(match status {
        StatusCode::UNAUTHORIZED => DiscoveryError::Auth(format!("API key rejected: {}", detail)),
        StatusCode::FORBIDDEN if body.contains("quotaExceeded") || body.contains("rateLimitExceeded") => {
            DiscoveryError::Transient("YouTube API quota exceeded".to_string())
        }
        StatusCode::FORBIDDEN => DiscoveryError::Auth(format!("Access denied: {}", detail)),
        StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") || body.contains("keyInvalid") => {
            DiscoveryError::Auth("API key not valid".to_string())
        }
        StatusCode::NOT_FOUND => DiscoveryError::NotFound(detail),
        StatusCode::TOO_MANY_REQUESTS => {
            DiscoveryError::Transient("Rate limited by YouTube API".to_string())
        }
        s if s.is_server_error() => {
            DiscoveryError::Transient(format!("YouTube API returned {}", s))
        }
        s => DiscoveryError::Config(format!("YouTube API rejected the request ({}): {}", s, detail)),
    })
}

#[derive(Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<Channel>,
}

#[derive(Deserialize)]
struct Channel {
    snippet: ChannelSnippet,
    #[serde(rename = "contentDetails")]
    content_details: ChannelContentDetails,
}

#[derive(Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Deserialize)]
struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists")]
    related_playlists: RelatedPlaylists,
}

#[derive(Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Deserialize)]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    snippet: PlaylistSnippet,
    #[serde(rename = "contentDetails")]
    content_details: Option<PlaylistContentDetails>,
}

#[derive(Deserialize)]
struct PlaylistSnippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Deserialize)]
struct PlaylistContentDetails {
    #[serde(rename = "videoPublishedAt")]
    video_published_at: Option<String>,
}

#[async_trait]
impl Discovery for YoutubeDiscovery {
    async fn discover(
        &self,
        source: &Source,
        since: OffsetDateTime,
    ) -> Result<Vec<Item>, DiscoveryError> {
        if source.kind != SourceKind::Youtube {
            return Err(DiscoveryError::Config(format!(
                "{} is not a YouTube source",
                source
            )));
        }

        tracing::info!(source = %source, since = %since, "Fetching uploads from YouTube");

        let (channel_title, uploads) = self.resolve_channel(&source.handle).await?;

        let playlist: PlaylistItemsResponse = self
            .get(
                "playlistItems",
                &[
                    ("part", "snippet,contentDetails"),
                    ("playlistId", &uploads),
                    ("maxResults", "50"),
                ],
            )
            .await?;

        let mut items: Vec<Item> = playlist
            .items
            .into_iter()
            .filter(|entry| !UNAVAILABLE_TITLES.contains(&entry.snippet.title.as_str()))
            .filter_map(|entry| {
                let published = entry
                    .content_details
                    .and_then(|details| details.video_published_at)
                    .or(entry.snippet.published_at)?;
                let published_at = OffsetDateTime::parse(&published, &Rfc3339).ok()?;
                let video_id = entry.snippet.resource_id.video_id;

                Some(Item {
                    url: format!("https://www.youtube.com/watch?v={}", video_id),
                    id: video_id,
                    title: entry.snippet.title,
                    source: source.clone(),
                    source_name: channel_title.clone(),
                    description: entry.snippet.description,
                    published_at,
                    media_url: None,
                })
            })
            .filter(|item| item.published_at >= since)
            .collect();

        // Keep the most recent uploads, then hand them over oldest first
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(self.max_items);
        items.reverse();

        tracing::info!(source = %source, channel = %channel_title, count = items.len(), "Fetched uploads");

        Ok(items)
    }
}
