use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    format_instructions, parse_article_json, truncate_error_body, AiProvider, GeneratedArticle,
    GenerationError, GenerationRequest,
};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MODEL: &str = "claude-3-5-sonnet-20241022";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Anthropic provider using the Messages REST API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (used by tests with a mock server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn provider_id(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArticle, GenerationError> {
        let url = format!("{}/v1/messages", self.base_url);

        let body = json!({
            "model": MODEL,
            "max_tokens": MAX_TOKENS,
            "temperature": request.temperature,
            "messages": [{
                "role": "user",
                "content": format!("{}\n\n{}", request.prompt, format_instructions(request)),
            }],
        });

        debug!(model = MODEL, "Calling Anthropic messages");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = truncate_error_body(response).await;
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let payload: Value = response.json().await?;
        let text = payload["content"][0]["text"].as_str().ok_or_else(|| {
            GenerationError::Malformed("missing content text in response".to_string())
        })?;

        parse_article_json(text)
    }
}
