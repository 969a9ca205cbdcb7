//! Acceptance rules for model output before it becomes an article

use thiserror::Error;

/// Policy configuration
#[derive(Debug, Clone)]
pub struct ArticlePolicy {
    /// Minimum characters of cleaned article text
    pub min_chars: usize,
    /// Drop a `<transcript>…</transcript>` block the model echoed before the article
    pub strip_transcript_block: bool,
}

impl Default for ArticlePolicy {
    fn default() -> Self {
        Self {
            min_chars: 1,
            strip_transcript_block: true,
        }
    }
}

/// Why model output was rejected
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("Model output is empty")]
    Empty,
    #[error("Article too short: {len} < {min} characters")]
    TooShort { len: usize, min: usize },
}

impl ArticlePolicy {
    /// Clean model output and check it is usable as an article body
    pub fn apply(&self, output: &str) -> Result<String, PolicyViolation> {
        let mut text = output.trim();

        if self.strip_transcript_block {
            text = strip_transcript_block(text);
        }

        let text = unwrap_markdown_fence(text).trim();

        if text.is_empty() {
            return Err(PolicyViolation::Empty);
        }

        let len = text.chars().count();
        if len < self.min_chars {
            return Err(PolicyViolation::TooShort {
                len,
                min: self.min_chars,
            });
        }

        Ok(text.to_string())
    }
}

/// Keep only what follows the closing `</transcript>` tag, if there is one
fn strip_transcript_block(text: &str) -> &str {
    const CLOSE: &str = "</transcript>";
    match (text.find("<transcript>"), text.find(CLOSE)) {
        (Some(open), Some(close)) if open < close => text[close + CLOSE.len()..].trim(),
        _ => text,
    }
}

/// Unwrap output that is entirely one fenced block (```markdown … ```)
fn unwrap_markdown_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };

    let (first_line, remainder) = body.split_once('\n').unwrap_or((body, ""));
    let info = first_line.trim();
    if !(info.is_empty() || info.eq_ignore_ascii_case("markdown") || info.eq_ignore_ascii_case("md"))
    {
        return text;
    }

    // A fence inside the body means the output is not a single wrapped block
    if remainder.contains("\n```") {
        return text;
    }

    remainder
}
