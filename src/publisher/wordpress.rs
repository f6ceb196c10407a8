use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{PublishError, PublishRequest, Publisher};

/// Publishes posts to a WordPress site via the REST API, authenticated
/// with an application password.
pub struct WordPressPublisher {
    client: reqwest::Client,
    base_url: String,
    username: String,
    app_password: String,
}

impl WordPressPublisher {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        username: String,
        app_password: String,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            app_password,
        }
    }
}

#[async_trait]
impl Publisher for WordPressPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<i64, PublishError> {
        let url = format!("{}/wp-json/wp/v2/posts", self.base_url);

        // WordPress has no native featured-image-by-URL field, so a lead
        // image is embedded at the top of the body.
        let content = match request.image_url.as_deref() {
            Some(image_url) => format!("<img src=\"{image_url}\" />\n{}", request.html),
            None => request.html.clone(),
        };

        let body = json!({
            "title": request.title,
            "content": content,
            "status": "publish",
        });

        debug!(url = %url, "Posting to WordPress");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.app_password))
            .header("x-idempotency-key", &request.idempotency_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(500)
                .collect();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let payload: Value = response.json().await?;
        payload["id"]
            .as_i64()
            .ok_or_else(|| PublishError::Malformed("missing post id in response".to_string()))
    }
}
