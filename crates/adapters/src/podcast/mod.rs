//! Xiaoyuzhou podcast discovery
//!
//! The site renders episode data into a `__NEXT_DATA__` JSON script on every
//! page; podcast pages carry the recent episode list, episode pages carry a
//! single episode with its audio enclosure.

use async_trait::async_trait;
use digest_press_domain::{Discovery, DiscoveryError, Item, Source, SourceKind, parse_timestamp};
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use time::OffsetDateTime;

const DEFAULT_BASE_URL: &str = "https://www.xiaoyuzhoufm.com";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static NEXT_DATA: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__" type="application/json">(.*?)</script>"#).ok()
});

static EPISODE_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"episode/([a-f0-9]+)").ok());

static BARE_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[a-f0-9]{24}$").ok());

/// Extract an episode id from an episode URL or a bare 24-hex id
pub fn parse_episode_id(url_or_id: &str) -> Option<String> {
    let text = url_or_id.trim();

    if let Some(caps) = EPISODE_URL.as_ref().and_then(|re| re.captures(text)) {
        return Some(caps[1].to_string());
    }

    BARE_ID
        .as_ref()
        .filter(|re| re.is_match(text))
        .map(|_| text.to_string())
}

pub struct XiaoyuzhouDiscovery {
    client: Client,
    base_url: String,
    max_items: usize,
}

impl XiaoyuzhouDiscovery {
    pub fn new(max_items: usize) -> Result<Self, reqwest::Error> {
        Self::with_base_url(max_items, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(max_items: usize, base_url: String) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            max_items,
        })
    }

    /// Fetch a page and decode its embedded page props
    async fn page_props(&self, path: &str) -> Result<PageProps, DiscoveryError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Transient(format!("Request timed out: {}", url))
            } else {
                DiscoveryError::Transient(format!("Network error: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(match status {
                StatusCode::NOT_FOUND => DiscoveryError::NotFound(url),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    DiscoveryError::Auth(format!("{} returned {}", url, status))
                }
                _ => DiscoveryError::Transient(format!("{} returned {}", url, status)),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| DiscoveryError::Transient(format!("Failed to read page: {}", e)))?;

        extract_page_props(&html)
    }

    /// Look up a single episode by id
    pub async fn episode(&self, episode_id: &str) -> Result<Item, DiscoveryError> {
        tracing::info!(episode_id = %episode_id, "Fetching podcast episode");

        let props = self.page_props(&format!("episode/{}", episode_id)).await?;
        let episode = props
            .episode
            .ok_or_else(|| DiscoveryError::NotFound(format!("No episode data for {}", episode_id)))?;

        let podcast = episode.podcast.clone().unwrap_or_default();
        let source = Source::new(
            podcast.pid.clone().unwrap_or_else(|| episode_id.to_string()),
            SourceKind::Podcast,
        );
        let podcast_title = podcast.title.unwrap_or_default();

        let eid = episode.eid.clone().unwrap_or_else(|| episode_id.to_string());
        // An episode requested directly is processed whatever its age
        let fallback = OffsetDateTime::now_utc();
        Ok(episode.into_item(eid, source, podcast_title, &self.base_url, fallback))
    }
}

fn extract_page_props(html: &str) -> Result<PageProps, DiscoveryError> {
    let raw = NEXT_DATA
        .as_ref()
        .and_then(|re| re.captures(html))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| DiscoveryError::Transient("Page has no __NEXT_DATA__ payload".to_string()))?;

    let data: NextData = serde_json::from_str(&raw)
        .map_err(|e| DiscoveryError::Transient(format!("Invalid __NEXT_DATA__ payload: {}", e)))?;

    Ok(data.props.page_props)
}

#[derive(Deserialize)]
struct NextData {
    props: Props,
}

#[derive(Deserialize)]
struct Props {
    #[serde(rename = "pageProps", default)]
    page_props: PageProps,
}

#[derive(Deserialize, Default)]
struct PageProps {
    podcast: Option<PodcastData>,
    episode: Option<EpisodeData>,
}

#[derive(Deserialize, Default, Clone)]
struct PodcastData {
    pid: Option<String>,
    title: Option<String>,
    #[serde(default)]
    episodes: Vec<EpisodeData>,
}

#[derive(Deserialize, Clone)]
struct EpisodeData {
    eid: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    shownotes: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    enclosure: Option<Enclosure>,
    podcast: Option<PodcastData>,
}

#[derive(Deserialize, Clone)]
struct Enclosure {
    url: Option<String>,
}

impl EpisodeData {
    fn published_at(&self) -> Option<OffsetDateTime> {
        self.pub_date.as_deref().and_then(parse_timestamp)
    }

    fn into_item(
        self,
        eid: String,
        source: Source,
        source_name: String,
        base_url: &str,
        fallback_published: OffsetDateTime,
    ) -> Item {
        let published_at = self.published_at().unwrap_or(fallback_published);
        let description = self
            .shownotes
            .filter(|notes| !notes.trim().is_empty())
            .or(self.description)
            .unwrap_or_default();

        Item {
            url: format!("{}/episode/{}", base_url, eid),
            id: eid,
            title: self.title,
            source,
            source_name,
            description,
            published_at,
            media_url: self.enclosure.and_then(|enclosure| enclosure.url),
        }
    }
}

#[async_trait]
impl Discovery for XiaoyuzhouDiscovery {
    async fn discover(
        &self,
        source: &Source,
        since: OffsetDateTime,
    ) -> Result<Vec<Item>, DiscoveryError> {
        if source.kind != SourceKind::Podcast {
            return Err(DiscoveryError::Config(format!(
                "{} is not a podcast source",
                source
            )));
        }

        tracing::info!(source = %source, since = %since, "Fetching podcast episodes");

        let props = self.page_props(&format!("podcast/{}", source.handle)).await?;
        let podcast = props
            .podcast
            .ok_or_else(|| DiscoveryError::NotFound(format!("No podcast data for {}", source.handle)))?;
        let podcast_title = podcast.title.clone().unwrap_or_else(|| source.handle.clone());

        let mut items: Vec<Item> = podcast
            .episodes
            .into_iter()
            .filter_map(|episode| {
                let eid = episode.eid.clone()?;
                let published_at = episode.published_at()?;
                (published_at >= since).then(|| {
                    episode.into_item(
                        eid,
                        source.clone(),
                        podcast_title.clone(),
                        &self.base_url,
                        published_at,
                    )
                })
            })
            .collect();

        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(self.max_items);
        items.reverse();

        tracing::info!(source = %source, podcast = %podcast_title, count = items.len(), "Fetched episodes");

        Ok(items)
    }
}
