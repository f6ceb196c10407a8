use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    format_instructions, parse_article_json, truncate_error_body, AiProvider, GeneratedArticle,
    GenerationError, GenerationRequest,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const MODEL: &str = "gpt-4o";

/// OpenAI provider using the Chat Completions REST API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
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
impl AiProvider for OpenAiProvider {
    fn provider_id(&self) -> &'static str {
        "openai"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArticle, GenerationError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = json!({
            "model": MODEL,
            "temperature": request.temperature,
            "response_format": { "type": "json_object" },
            "messages": [{
                "role": "user",
                "content": format!("{}\n\n{}", request.prompt, format_instructions(request)),
            }],
        });

        debug!(model = MODEL, "Calling OpenAI chat completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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
        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GenerationError::Malformed("missing message content in response".to_string())
            })?;

        parse_article_json(text)
    }
}
