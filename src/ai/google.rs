use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    format_instructions, parse_article_json, truncate_error_body, AiProvider, GeneratedArticle,
    GenerationError, GenerationRequest,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const MODEL: &str = "gemini-1.5-flash";

/// Google Gemini provider using the `generateContent` REST API.
pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleProvider {
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
impl AiProvider for GoogleProvider {
    fn provider_id(&self) -> &'static str {
        "google"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArticle, GenerationError> {
        // The key goes in a header, never the URL: transport errors
        // render the full URL and end up in audit logs.
        let url = format!("{}/v1beta/models/{MODEL}:generateContent", self.base_url);

        let body = json!({
            "contents": [{
                "parts": [{
                    "text": format!("{}\n\n{}", request.prompt, format_instructions(request)),
                }],
            }],
            "generationConfig": {
                "temperature": request.temperature,
                "responseMimeType": "application/json",
            },
        });

        debug!(model = MODEL, "Calling Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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
        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                GenerationError::Malformed("missing candidate text in response".to_string())
            })?;

        parse_article_json(text)
    }
}
