//! Newsletter assembly - orders articles into one rendered digest

use time::OffsetDateTime;

use crate::{
    model::{Article, AssembledDigest, DigestIssue, DigestManifest},
    ports::{DigestRenderer, RenderError},
};

/// Configuration for the newsletter assembler
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    /// Newsletter name used in the masthead and subject line
    pub newsletter_title: String,
}

impl Default for AssembleConfig {
    fn default() -> Self {
        Self {
            newsletter_title: "Digest Press".to_string(),
        }
    }
}

/// Builds a digest from articles in processing order
pub struct NewsletterAssembler<R> {
    renderer: R,
    config: AssembleConfig,
}

impl<R: DigestRenderer> NewsletterAssembler<R> {
    pub fn new(renderer: R, config: AssembleConfig) -> Self {
        Self { renderer, config }
    }

    /// Render the articles; empty input is an error
    pub fn assemble(
        &self,
        articles: &[Article],
        template_hash: &str,
        now: OffsetDateTime,
    ) -> Result<AssembledDigest, RenderError> {
        if articles.is_empty() {
            return Err(RenderError::Empty);
        }

        let date = display_date(now);
        let issue = DigestIssue {
            title: self.config.newsletter_title.clone(),
            date: date.clone(),
            articles: articles.to_vec(),
        };

        let html = self.renderer.render_html(&issue)?;
        let ebook = self.renderer.render_ebook(&issue)?;

        let manifest = DigestManifest {
            date: date.clone(),
            created_at: now,
            article_count: articles.len(),
            source_names: distinct_source_names(articles),
            article_titles: articles.iter().map(|a| a.title.clone()).collect(),
            template_hash: template_hash.to_string(),
        };

        tracing::info!(
            article_count = manifest.article_count,
            sources = ?manifest.source_names,
            html_bytes = html.len(),
            ebook_bytes = ebook.len(),
            "Assembled digest"
        );

        Ok(AssembledDigest {
            subject: format!("{} - {}", self.config.newsletter_title, date),
            html,
            ebook,
            manifest,
        })
    }
}

impl<R: DigestRenderer + ?Sized> DigestRenderer for &R {
    fn render_html(&self, issue: &DigestIssue) -> Result<String, RenderError> {
        (*self).render_html(issue)
    }

    fn render_ebook(&self, issue: &DigestIssue) -> Result<Vec<u8>, RenderError> {
        (*self).render_ebook(issue)
    }
}

/// "October 16, 2026"
pub fn display_date(at: OffsetDateTime) -> String {
    format!("{} {}, {}", at.month(), at.day(), at.year())
}

fn distinct_source_names(articles: &[Article]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for article in articles {
        if !names.contains(&article.source_name) {
            names.push(article.source_name.clone());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    struct ListingRenderer;

    impl DigestRenderer for ListingRenderer {
        fn render_html(&self, issue: &DigestIssue) -> Result<String, RenderError> {
            Ok(issue
                .articles
                .iter()
                .map(|a| a.title.as_str())
                .collect::<Vec<_>>()
                .join(","))
        }

        fn render_ebook(&self, issue: &DigestIssue) -> Result<Vec<u8>, RenderError> {
            Ok(issue.title.as_bytes().to_vec())
        }
    }

    struct BrokenRenderer;

    impl DigestRenderer for BrokenRenderer {
        fn render_html(&self, _issue: &DigestIssue) -> Result<String, RenderError> {
            Ok(String::new())
        }

        fn render_ebook(&self, _issue: &DigestIssue) -> Result<Vec<u8>, RenderError> {
            Err(RenderError::Ebook("disk full".to_string()))
        }
    }

    fn article(title: &str, source: &str) -> Article {
        Article {
            item_id: title.to_lowercase(),
            title: title.to_string(),
            source_name: source.to_string(),
            url: format!("https://example.com/{}", title),
            body: format!("# {}", title),
        }
    }

    #[test]
    fn preserves_article_order() {
        let assembler = NewsletterAssembler::new(ListingRenderer, AssembleConfig::default());
        let articles = vec![
            article("C", "Two"),
            article("A", "One"),
            article("B", "Two"),
        ];

        let digest = assembler
            .assemble(&articles, "hash", datetime!(2026-10-16 08:00 UTC))
            .unwrap();

        assert_eq!(digest.html, "C,A,B");
        assert_eq!(digest.manifest.article_titles, vec!["C", "A", "B"]);
        assert_eq!(digest.manifest.article_count, 3);
    }

    #[test]
    fn manifest_keeps_every_distinct_source() {
        let assembler = NewsletterAssembler::new(ListingRenderer, AssembleConfig::default());
        let articles = vec![
            article("1", "Alpha"),
            article("2", "Beta"),
            article("3", "Alpha"),
            article("4", "Gamma"),
            article("5", "Delta"),
        ];

        let digest = assembler
            .assemble(&articles, "hash", datetime!(2026-10-16 08:00 UTC))
            .unwrap();

        assert_eq!(
            digest.manifest.source_names,
            vec!["Alpha", "Beta", "Gamma", "Delta"]
        );
        assert_eq!(digest.manifest.template_hash, "hash");
    }

    #[test]
    fn dates_and_subject() {
        let assembler = NewsletterAssembler::new(
            ListingRenderer,
            AssembleConfig {
                newsletter_title: "Morning Read".to_string(),
            },
        );

        let digest = assembler
            .assemble(&[article("A", "One")], "h", datetime!(2026-03-05 23:59 UTC))
            .unwrap();

        assert_eq!(digest.manifest.date, "March 5, 2026");
        assert_eq!(digest.subject, "Morning Read - March 5, 2026");
    }

    #[test]
    fn empty_input_is_an_error() {
        let assembler = NewsletterAssembler::new(ListingRenderer, AssembleConfig::default());
        assert!(matches!(
            assembler.assemble(&[], "h", datetime!(2026-10-16 08:00 UTC)),
            Err(RenderError::Empty)
        ));
    }

    #[test]
    fn renderer_failure_propagates() {
        let assembler = NewsletterAssembler::new(BrokenRenderer, AssembleConfig::default());
        assert!(matches!(
            assembler.assemble(&[article("A", "One")], "h", datetime!(2026-10-16 08:00 UTC)),
            Err(RenderError::Ebook(_))
        ));
    }
}
