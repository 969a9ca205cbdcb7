//! Rewrite use case - turns a transcript into a long-form article

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    model::{Article, Item},
    policy::{ArticlePolicy, PolicyViolation},
    ports::{RewriteError, Rewriter},
    template::{InstructionTemplate, TemplateFields},
};

/// Configuration for the rewrite engine
#[derive(Debug, Clone)]
pub struct RewriteConfig {
    /// Maximum characters of item description substituted into the prompt
    pub description_limit: usize,
    /// Output acceptance rules
    pub policy: ArticlePolicy,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            description_limit: 2000,
            policy: ArticlePolicy::default(),
        }
    }
}

/// Why an item could not be rewritten
#[derive(Debug, Error)]
pub enum RewriteFailure {
    #[error(transparent)]
    Model(#[from] RewriteError),
    #[error("Rejected model output: {0}")]
    Rejected(#[from] PolicyViolation),
}

/// Rewrite engine: one model call per item, no retries
pub struct RewriteEngine<R> {
    rewriter: R,
    config: RewriteConfig,
}

impl<R: Rewriter> RewriteEngine<R> {
    pub fn new(rewriter: R, config: RewriteConfig) -> Self {
        Self { rewriter, config }
    }

    /// Rewrite an item's transcript into an article
    pub async fn rewrite(
        &self,
        item: &Item,
        transcript: &str,
        template: &InstructionTemplate,
    ) -> Result<Article, RewriteFailure> {
        let published = item.published_at.date().to_string();
        let fields = TemplateFields {
            title: &item.title,
            source: &item.source_name,
            url: &item.url,
            description: &item.description,
            transcript,
            published: &published,
        };

        let body = self.write(fields, template).await?;

        Ok(Article {
            item_id: item.id.clone(),
            title: item.title.clone(),
            source_name: item.source_name.clone(),
            url: item.url.clone(),
            body,
        })
    }

    /// Render the template with the given fields and return cleaned article markdown
    pub async fn write(
        &self,
        fields: TemplateFields<'_>,
        template: &InstructionTemplate,
    ) -> Result<String, RewriteFailure> {
        let description = truncate_chars(fields.description, self.config.description_limit);
        let prompt = template.render(&TemplateFields {
            description,
            ..fields
        });

        tracing::info!(
            provider = self.rewriter.provider(),
            title = %fields.title,
            transcript_chars = fields.transcript.chars().count(),
            prompt_chars = prompt.chars().count(),
            "Rewriting transcript"
        );

        let output = self.rewriter.generate(&prompt).await?;
        let body = self.config.policy.apply(&output)?;

        tracing::debug!(
            title = %fields.title,
            article_chars = body.chars().count(),
            "Article accepted"
        );

        Ok(body)
    }
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[async_trait]
impl<R: Rewriter + ?Sized> Rewriter for &R {
    async fn generate(&self, prompt: &str) -> Result<String, RewriteError> {
        (*self).generate(prompt).await
    }

    fn provider(&self) -> &'static str {
        (*self).provider()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Source, SourceKind};
    use std::sync::Mutex;
    use time::macros::datetime;

    struct RecordingRewriter {
        output: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingRewriter {
        fn returning(output: &str) -> Self {
            Self {
                output: Ok(output.to_string()),
                prompts: Mutex::new(vec![]),
            }
        }

        fn failing() -> Self {
            Self {
                output: Err(()),
                prompts: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl Rewriter for RecordingRewriter {
        async fn generate(&self, prompt: &str) -> Result<String, RewriteError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.output
                .clone()
                .map_err(|_| RewriteError::Api("boom".to_string()))
        }

        fn provider(&self) -> &'static str {
            "recording"
        }
    }

    fn item(description: &str) -> Item {
        Item {
            id: "vid1".to_string(),
            title: "The Talk".to_string(),
            source: Source::new("@chan", SourceKind::Youtube),
            source_name: "Chan".to_string(),
            url: "https://www.youtube.com/watch?v=vid1".to_string(),
            description: description.to_string(),
            published_at: datetime!(2026-10-01 12:00 UTC),
            media_url: None,
        }
    }

    #[tokio::test]
    async fn rewrite_builds_article_from_item() {
        let rewriter = RecordingRewriter::returning("# Headline\n\nBody");
        let engine = RewriteEngine::new(&rewriter, RewriteConfig::default());
        let template =
            InstructionTemplate::new("{{title}}|{{source}}|{{published}}|{{transcript}}");

        let article = engine
            .rewrite(&item("desc"), "spoken words", &template)
            .await
            .unwrap();

        assert_eq!(article.item_id, "vid1");
        assert_eq!(article.source_name, "Chan");
        assert_eq!(article.body, "# Headline\n\nBody");
        assert_eq!(
            rewriter.prompts.lock().unwrap()[0],
            "The Talk|Chan|2026-10-01|spoken words"
        );
    }

    #[tokio::test]
    async fn description_is_truncated() {
        let rewriter = RecordingRewriter::returning("ok");
        let config = RewriteConfig {
            description_limit: 5,
            ..Default::default()
        };
        let engine = RewriteEngine::new(&rewriter, config);
        let template = InstructionTemplate::new("[{{description}}] {{transcript}}");

        engine
            .rewrite(&item("éèêëàâ long description"), "t", &template)
            .await
            .unwrap();

        assert_eq!(rewriter.prompts.lock().unwrap()[0], "[éèêëà] t");
    }

    #[tokio::test]
    async fn empty_output_is_rejected() {
        let rewriter = RecordingRewriter::returning("  \n ");
        let engine = RewriteEngine::new(&rewriter, RewriteConfig::default());

        let result = engine
            .rewrite(&item(""), "t", &InstructionTemplate::default())
            .await;

        assert!(matches!(
            result,
            Err(RewriteFailure::Rejected(PolicyViolation::Empty))
        ));
    }

    #[tokio::test]
    async fn model_failure_is_not_retried() {
        let rewriter = RecordingRewriter::failing();
        let engine = RewriteEngine::new(&rewriter, RewriteConfig::default());

        let result = engine
            .rewrite(&item(""), "t", &InstructionTemplate::default())
            .await;

        assert!(matches!(
            result,
            Err(RewriteFailure::Model(RewriteError::Api(_)))
        ));
        assert_eq!(rewriter.prompts.lock().unwrap().len(), 1);
    }
}
