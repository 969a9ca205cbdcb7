//! Stub rewriter for testing and offline mode

use async_trait::async_trait;
use digest_press_domain::{RewriteError, Rewriter};

/// Stub rewriter that returns configurable responses
pub struct StubRewriter {
    response: Option<String>,
    error: Option<fn() -> RewriteError>,
}

impl StubRewriter {
    /// A stub that writes a short deterministic article from the prompt
    pub fn echo() -> Self {
        Self {
            response: None,
            error: None,
        }
    }

    /// A stub that always returns `response`
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            error: None,
        }
    }

    /// A stub that always fails with the error `make` builds
    pub fn with_error(make: fn() -> RewriteError) -> Self {
        Self {
            response: None,
            error: Some(make),
        }
    }
}

impl Default for StubRewriter {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl Rewriter for StubRewriter {
    async fn generate(&self, prompt: &str) -> Result<String, RewriteError> {
        if let Some(make) = self.error {
            return Err(make());
        }

        if let Some(ref response) = self.response {
            return Ok(response.clone());
        }

        let excerpt: String = prompt.chars().take(280).collect();
        Ok(format!(
            "## Offline draft\n\nThis article was produced without a language model. \
             It quotes the beginning of the request it received:\n\n> {}\n",
            excerpt.replace('\n', " ")
        ))
    }

    fn provider(&self) -> &'static str {
        "stub"
    }
}
