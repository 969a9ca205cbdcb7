//! HTML email and EPUB rendering of digest issues

mod epub;
mod html;

use digest_press_domain::{Article, DigestIssue, DigestRenderer, RenderError};
use pulldown_cmark::{Event, Options, Parser};

/// Renders article markdown with pulldown-cmark into an HTML email and an EPUB 3 book
#[derive(Debug, Clone, Default)]
pub struct MarkdownDigestRenderer {
    /// Value of the EPUB `dc:language` element
    language: Option<String>,
}

impl MarkdownDigestRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
        }
    }

    fn language(&self) -> &str {
        self.language.as_deref().unwrap_or("en")
    }
}

impl DigestRenderer for MarkdownDigestRenderer {
    fn render_html(&self, issue: &DigestIssue) -> Result<String, RenderError> {
        if issue.articles.is_empty() {
            return Err(RenderError::Empty);
        }
        Ok(html::render(issue))
    }

    fn render_ebook(&self, issue: &DigestIssue) -> Result<Vec<u8>, RenderError> {
        if issue.articles.is_empty() {
            return Err(RenderError::Empty);
        }
        epub::render(issue, self.language()).map_err(|e| RenderError::Ebook(e.to_string()))
    }
}

/// Markdown to an HTML fragment; raw HTML in the model output is shown as text
pub(crate) fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_SMART_PUNCTUATION;

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    pulldown_cmark::html::push_html(&mut out, parser);
    out
}

/// Headline shown in tables of contents: the article's own `# ` heading, else the item title
pub(crate) fn headline(article: &Article) -> &str {
    article
        .body
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.strip_prefix("# "))
        .map(str::trim)
        .filter(|heading| !heading.is_empty())
        .unwrap_or(&article.title)
}

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn article(n: usize, body: &str) -> Article {
        Article {
            item_id: format!("item{}", n),
            title: format!("Episode {}", n),
            source_name: format!("Creator {}", n),
            url: format!("https://www.youtube.com/watch?v=item{}", n),
            body: body.to_string(),
        }
    }

    pub(crate) fn issue(articles: Vec<Article>) -> DigestIssue {
        DigestIssue {
            title: "Digest Press".to_string(),
            date: "October 16, 2026".to_string(),
            articles,
        }
    }

    #[test]
    fn markdown_is_rendered_and_raw_html_escaped() {
        let html = markdown_to_html("## Part one\n\nSome **bold** text.\n\n<script>alert(1)</script>\n");
        assert!(html.contains("<h2>Part one</h2>"));
        assert!(html.contains("<strong>bold</strong>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn headline_prefers_article_heading() {
        assert_eq!(headline(&article(1, "\n# The Long Bridge\n\nText")), "The Long Bridge");
        assert_eq!(headline(&article(2, "No heading here")), "Episode 2");
    }

    #[test]
    fn empty_issue_is_rejected() {
        let renderer = MarkdownDigestRenderer::new();
        assert!(matches!(renderer.render_html(&issue(vec![])), Err(RenderError::Empty)));
        assert!(matches!(renderer.render_ebook(&issue(vec![])), Err(RenderError::Empty)));
    }
}
