//! Domain models and value objects

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Kind of content origin; selects the discovery and transcript adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A video channel (YouTube)
    Youtube,
    /// A podcast feed (Xiaoyuzhou)
    Podcast,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Youtube => "youtube",
            SourceKind::Podcast => "podcast",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static YOUTUBE_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"youtube\.com/@([\w.-]+)",
        r"youtube\.com/c/([\w.-]+)",
        r"youtube\.com/user/([\w.-]+)",
        r"youtube\.com/channel/(UC[\w-]{22})",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static PODCAST_URL_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"xiaoyuzhoufm\.com/podcast/([a-f0-9]{24})").ok());

static HANDLE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(@[\w.-]+|UC[\w-]{22}|[a-f0-9]{24})$").ok());

/// A content origin the operator follows (channel or podcast)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    /// Stable handle: `@name` or `UC…` channel id for YouTube, 24-hex id for podcasts
    pub handle: String,
    /// Which platform the handle belongs to
    pub kind: SourceKind,
}

impl Source {
    pub fn new(handle: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            handle: handle.into(),
            kind,
        }
    }

    /// Normalize operator input (URL, `@handle` or bare name) into a source.
    ///
    /// Returns `None` when the input cannot be recognized.
    pub fn parse(input: &str) -> Option<Self> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(pattern) = PODCAST_URL_PATTERN.as_ref() {
            if let Some(caps) = pattern.captures(text) {
                return Some(Self::new(&caps[1], SourceKind::Podcast));
            }
        }

        for pattern in YOUTUBE_URL_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(text) {
                let handle = &caps[1];
                if handle.starts_with("UC") && handle.len() == 24 {
                    return Some(Self::new(handle, SourceKind::Youtube));
                }
                return Some(Self::new(format!("@{}", handle), SourceKind::Youtube));
            }
        }

        if text.starts_with("http") || text.contains('/') || text.contains(char::is_whitespace) {
            return None;
        }

        if text.len() == 24 && text.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Some(Self::new(text, SourceKind::Podcast));
        }

        let handle = if text.starts_with('@') || (text.starts_with("UC") && text.len() == 24) {
            text.to_string()
        } else {
            format!("@{}", text)
        };

        let source = Self::new(handle, SourceKind::Youtube);
        source.is_valid().then_some(source)
    }

    /// Whether the handle is well-formed for its kind
    pub fn is_valid(&self) -> bool {
        let Some(pattern) = HANDLE_PATTERN.as_ref() else {
            return false;
        };
        if !pattern.is_match(&self.handle) {
            return false;
        }
        match self.kind {
            SourceKind::Youtube => {
                self.handle.starts_with('@')
                    || (self.handle.starts_with("UC") && self.handle.len() == 24)
            }
            SourceKind::Podcast => !self.handle.starts_with('@') && self.handle.len() == 24,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.handle, self.kind)
    }
}

/// One discoverable unit of content (a video or an episode)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Platform-specific item ID; the ledger key
    pub id: String,
    /// Item title
    pub title: String,
    /// Source the item was discovered from
    pub source: Source,
    /// Human-readable creator name (channel or podcast title)
    pub source_name: String,
    /// Public URL of the item
    pub url: String,
    /// Description or show notes
    pub description: String,
    /// When the item was published
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
    /// Direct media URL (audio enclosure), when the platform exposes one
    pub media_url: Option<String>,
}

/// Result of asking the transcription service for an item's transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptOutcome {
    /// Transcript text was returned
    Text(String),
    /// The service has no transcript for this item (no captions, unsupported media)
    NotAvailable(String),
    /// The service refused the request due to rate limiting
    RateLimited,
    /// Transport, timeout, authentication or configuration failure
    Failed(String),
}

impl TranscriptOutcome {
    /// Collapse to the orchestrator's view: text or absent
    pub fn into_text(self) -> Option<String> {
        match self {
            TranscriptOutcome::Text(text) if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }

    /// Short description of a non-text outcome for logs and run summaries
    pub fn describe(&self) -> String {
        match self {
            TranscriptOutcome::Text(text) if text.trim().is_empty() => {
                "transcript was empty".to_string()
            }
            TranscriptOutcome::Text(_) => "transcript available".to_string(),
            TranscriptOutcome::NotAvailable(reason) => format!("not available: {}", reason),
            TranscriptOutcome::RateLimited => "rate limited by transcript service".to_string(),
            TranscriptOutcome::Failed(reason) => format!("transcript request failed: {}", reason),
        }
    }
}

/// A rewritten long-form article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// ID of the item the article was written from
    pub item_id: String,
    /// Title of the original item
    pub title: String,
    /// Creator name
    pub source_name: String,
    /// URL of the original item
    pub url: String,
    /// Generated markdown
    pub body: String,
}

/// Persisted record of a processed item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub title: String,
    /// Creator name; older tracker files call this `channel`
    #[serde(alias = "channel")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(with = "lenient_timestamp")]
    pub processed_at: OffsetDateTime,
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one (assumed UTC)
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }

    let format = time::format_description::parse("[year]-[month]-[day]T[hour]:[minute]:[second]")
        .ok()?;
    let without_fraction = raw.split('.').next()?;
    PrimitiveDateTime::parse(without_fraction, &format)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

mod lenient_timestamp {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        time::serde::rfc3339::serialize(value, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
    }
}

/// A ledger entry together with its key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub item_id: String,
    #[serde(flatten)]
    pub entry: LedgerEntry,
}

/// Input to digest rendering
#[derive(Debug, Clone)]
pub struct DigestIssue {
    /// Newsletter name shown in the masthead
    pub title: String,
    /// Display date, e.g. "October 16, 2026"
    pub date: String,
    /// Articles in processing order
    pub articles: Vec<Article>,
}

/// Digest-level metadata recorded in the archive manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestManifest {
    /// Display date
    pub date: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub article_count: usize,
    /// Every distinct source name, in order of first appearance
    pub source_names: Vec<String>,
    pub article_titles: Vec<String>,
    /// Fingerprint of the instruction template the articles were written with
    pub template_hash: String,
}

/// A rendered digest ready for delivery
#[derive(Debug, Clone)]
pub struct AssembledDigest {
    /// Email subject line
    pub subject: String,
    pub html: String,
    pub ebook: Vec<u8>,
    pub manifest: DigestManifest,
}

/// Where the rendered files of a digest were stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestFiles {
    pub html_file: String,
    pub ebook_file: String,
}

/// Archived record of one sent newsletter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRecord {
    #[serde(flatten)]
    pub manifest: DigestManifest,
    #[serde(flatten)]
    pub files: DigestFiles,
    pub delivered_to: String,
    /// Delivery channel that sent it ("smtp", "outbox")
    pub channel: String,
}

/// Why an item was skipped during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemErrorKind {
    NoTranscript,
    RewriteFailed,
    LedgerWriteFailed,
}

impl fmt::Display for ItemErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemErrorKind::NoTranscript => "no_transcript",
            ItemErrorKind::RewriteFailed => "rewrite_failed",
            ItemErrorKind::LedgerWriteFailed => "ledger_write_failed",
        })
    }
}

/// Item-scoped failure recorded in the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub item_id: String,
    pub title: String,
    pub kind: ItemErrorKind,
    pub message: String,
}

/// Classification of a source-scoped discovery failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Transient,
    Auth,
    NotFound,
    Config,
}

/// Source-scoped failure recorded in the run summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceError {
    pub source: Source,
    pub kind: SourceErrorKind,
    pub message: String,
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The catalog is empty
    NoSources,
    /// Every discovered item is already in the ledger
    NoNewItems,
    /// Items were attempted but none produced an article
    NoArticles,
    /// A digest was sent and archived
    Delivered,
    /// Articles were written but the digest could not be sent
    DeliveryFailed,
}

/// Result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub sources_checked: usize,
    pub items_discovered: usize,
    /// Discovered items skipped because the ledger already has them
    pub items_already_processed: usize,
    /// Items taken from the work queue
    pub items_processed: usize,
    pub articles_written: usize,
    pub digest: Option<DigestRecord>,
    pub errors: Vec<ItemError>,
    pub source_errors: Vec<SourceError>,
    pub delivery_error: Option<String>,
    /// Rendered files left for manual resend after a failed delivery
    pub unsent_files: Option<DigestFiles>,
    pub outcome: RunOutcome,
}

impl RunSummary {
    pub fn new(started_at: OffsetDateTime) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            sources_checked: 0,
            items_discovered: 0,
            items_already_processed: 0,
            items_processed: 0,
            articles_written: 0,
            digest: None,
            errors: vec![],
            source_errors: vec![],
            delivery_error: None,
            unsent_files: None,
            outcome: RunOutcome::NoSources,
        }
    }

    /// "Nothing to do" outcomes that are not errors
    pub fn is_informational(&self) -> bool {
        matches!(self.outcome, RunOutcome::NoSources | RunOutcome::NoNewItems)
    }

    /// Whether anything went wrong that the operator should look at
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || !self.source_errors.is_empty() || self.delivery_error.is_some()
    }

    /// Operator-facing log of the run
    pub fn log_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        match self.outcome {
            RunOutcome::NoSources => {
                lines.push("No sources configured. Add one with `sources add`.".to_string())
            }
            RunOutcome::NoNewItems => {
                lines.push("No new items to process. All caught up!".to_string())
            }
            RunOutcome::NoArticles => {
                lines.push("No articles could be written this run.".to_string())
            }
            RunOutcome::Delivered => lines.push("Newsletter sent successfully.".to_string()),
            RunOutcome::DeliveryFailed => {
                lines.push("Articles were written but the newsletter was NOT sent.".to_string())
            }
        }

        lines.push(format!(
            "Sources checked: {}, items discovered: {} ({} already processed), items attempted: {}, articles written: {}",
            self.sources_checked,
            self.items_discovered,
            self.items_already_processed,
            self.items_processed,
            self.articles_written
        ));

        for error in &self.source_errors {
            lines.push(format!(
                "  ✗ source {} [{:?}]: {}",
                error.source, error.kind, error.message
            ));
        }

        for error in &self.errors {
            lines.push(format!(
                "  ✗ {} \"{}\" [{}]: {}",
                error.item_id, error.title, error.kind, error.message
            ));
        }

        if let Some(digest) = &self.digest {
            lines.push(format!(
                "Digest of {} articles sent to {} via {} ({}, {})",
                digest.manifest.article_count,
                digest.delivered_to,
                digest.channel,
                digest.files.html_file,
                digest.files.ebook_file
            ));
        }

        if let Some(error) = &self.delivery_error {
            lines.push(format!("Delivery error: {}", error));
        }

        if let Some(files) = &self.unsent_files {
            lines.push(format!(
                "Unsent digest kept for manual resend: {}, {}",
                files.html_file, files.ebook_file
            ));
        }

        lines
    }
}
