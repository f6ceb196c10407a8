//! Pluggable AI providers. Each provider accepts a prompt, temperature
//! and target word-count range, and returns a structured article; the
//! provider is responsible for honoring the length bounds.

mod anthropic;
mod google;
mod openai;

pub use anthropic::AnthropicProvider;
pub use google::GoogleProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("provider returned a malformed response: {0}")]
    Malformed(String),
    #[error("provider returned an empty payload")]
    EmptyPayload,
}

/// One generation call's inputs. Bounds are passed through to the
/// provider, not renegotiated here.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub temperature: f64,
    pub min_words: i64,
    pub max_words: i64,
}

/// Structured article returned by a provider.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    pub html: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "seoScore")]
    pub seo_score: Option<i64>,
}

/// A configured AI provider instance.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Stable identifier matching the `ai_provider` settings value.
    fn provider_id(&self) -> &'static str;

    /// Generate one article from the request.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArticle, GenerationError>;
}

/// Instruction block appended to every provider prompt so the model
/// answers with the structured payload we parse below.
pub(crate) fn format_instructions(request: &GenerationRequest) -> String {
    format!(
        "Respond with a single JSON object and nothing else, using exactly these keys: \
         \"title\" (string), \"html\" (string, the full article body as HTML), \
         \"summary\" (string, 1-2 sentences), \"seo_score\" (integer 0-100). \
         The article body must be between {} and {} words.",
        request.min_words, request.max_words
    )
}

/// Error body capped before it reaches logs and audit entries.
pub(crate) async fn truncate_error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(500)
        .collect()
}

/// Parse the article JSON out of a model's text reply, tolerating
/// markdown code fences around the object.
pub(crate) fn parse_article_json(text: &str) -> Result<GeneratedArticle, GenerationError> {
    let trimmed = text.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map_or(trimmed, |rest| rest.strip_suffix("```").unwrap_or(rest));

    serde_json::from_str(stripped.trim()).map_err(|e| GenerationError::Malformed(e.to_string()))
}
