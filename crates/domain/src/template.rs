//! Operator-editable instruction template for the rewrite engine

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use thiserror::Error;

/// Names that may appear as `{{name}}` in a template
pub const PLACEHOLDERS: &[&str] = &[
    "title",
    "source",
    "url",
    "description",
    "transcript",
    "published",
];

static PLACEHOLDER_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").ok());

/// Built-in magazine-writer prompt used until the operator saves their own
pub const DEFAULT_TEMPLATE: &str = r#"You are a skilled magazine writer. Transform this transcript into a well-written, engaging article.

TITLE: {{title}}
SOURCE: {{source}}
URL: {{url}}
PUBLISHED: {{published}}

DESCRIPTION:
{{description}}

TRANSCRIPT:
{{transcript}}

---

Remix this transcript into a magazine article. Guidelines:
- Use the title and description to correct any transcription errors, especially names of people, companies, or technical terms. The description often contains the correct spellings.
- Start with an engaging headline (different from the original title).
- The audience is a curious individual who is generally smart but not a specialist in the area discussed.
- Highly engaging and readable. Wherever jargon or obscure references appear, explain them. Extremely well-written; think New Yorker or the Atlantic.
- Capture the key insights, especially contrarian viewpoints, memorable anecdotes, and surprising insights. Preserve key quotes (clean up filler words and transcription errors).
- There is no fixed length requirement; it depends on the length of the original and its insight density. This should be a satisfying long-read.
- Do NOT include phrases like "In this video" or "In this episode". Write it as a standalone article for a reader who has zero context; it replaces watching or listening.

Format the article in clean markdown."#;

/// Error type for templates and the template store
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template is empty")]
    Empty,
    #[error("Unknown placeholder '{{{{{0}}}}}'; known placeholders: {known}", known = PLACEHOLDERS.join(", "))]
    UnknownPlaceholder(String),
    #[error("Template never includes the transcript; add {{{{transcript}}}}")]
    MissingTranscript,
}

/// Values substituted into a template for one item
#[derive(Debug, Clone, Copy)]
pub struct TemplateFields<'a> {
    pub title: &'a str,
    pub source: &'a str,
    pub url: &'a str,
    pub description: &'a str,
    pub transcript: &'a str,
    pub published: &'a str,
}

/// Instruction template with `{{name}}` substitution points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionTemplate {
    text: String,
}

impl InstructionTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names in order of appearance
    pub fn placeholders(&self) -> Vec<String> {
        let Some(pattern) = PLACEHOLDER_PATTERN.as_ref() else {
            return vec![];
        };
        pattern
            .captures_iter(&self.text)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.text.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let placeholders = self.placeholders();
        if let Some(unknown) = placeholders
            .iter()
            .find(|name| !PLACEHOLDERS.contains(&name.as_str()))
        {
            return Err(TemplateError::UnknownPlaceholder(unknown.clone()));
        }

        if !placeholders.iter().any(|name| name == "transcript") {
            return Err(TemplateError::MissingTranscript);
        }

        Ok(())
    }

    /// Substitute item fields in a single pass; substituted text is never re-scanned
    pub fn render(&self, fields: &TemplateFields<'_>) -> String {
        let Some(pattern) = PLACEHOLDER_PATTERN.as_ref() else {
            return self.text.clone();
        };
        pattern
            .replace_all(&self.text, |caps: &Captures<'_>| match &caps[1] {
                "title" => fields.title.to_string(),
                "source" => fields.source.to_string(),
                "url" => fields.url.to_string(),
                "description" => fields.description.to_string(),
                "transcript" => fields.transcript.to_string(),
                "published" => fields.published.to_string(),
                _ => caps[0].to_string(),
            })
            .into_owned()
    }

    /// SHA-256 fingerprint of the template text
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl Default for InstructionTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}
