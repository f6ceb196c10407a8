//! Content generation: assembles the prompt for one feed entry, invokes
//! the configured AI provider and validates the returned payload.
//! Length bounds and temperature are passed through, not enforced here.

use tracing::debug;

use crate::ai::{AiProvider, GeneratedArticle, GenerationError, GenerationRequest};
use crate::db::Settings;
use crate::feed::FeedEntry;

/// Assemble the generation prompt from the user's template and the entry.
#[must_use]
pub fn build_prompt(settings: &Settings, entry: &FeedEntry) -> String {
    let mut prompt = settings.ai_prompt.trim().to_string();
    prompt.push_str("\n\nSource title: ");
    prompt.push_str(&entry.title);
    if let Some(summary) = entry.summary.as_deref() {
        prompt.push_str("\nSource content: ");
        prompt.push_str(summary);
    }
    prompt
}

/// Generate a draft article for one entry.
///
/// # Errors
///
/// Returns `GenerationError` on provider failure, or `EmptyPayload` when
/// the provider returns a blank title or body.
pub async fn generate_article(
    ai: &dyn AiProvider,
    settings: &Settings,
    entry: &FeedEntry,
) -> Result<GeneratedArticle, GenerationError> {
    let request = GenerationRequest {
        prompt: build_prompt(settings, entry),
        temperature: settings.ai_temperature,
        min_words: settings.ai_word_count_min,
        max_words: settings.ai_word_count_max,
    };

    debug!(
        provider = ai.provider_id(),
        entry_id = %entry.id,
        "Generating article"
    );

    let article = ai.generate(&request).await?;

    if article.title.trim().is_empty() || article.html.trim().is_empty() {
        return Err(GenerationError::EmptyPayload);
    }

    Ok(article)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(summary: Option<&str>) -> FeedEntry {
        FeedEntry {
            id: "t3_abc".to_string(),
            title: "Original title".to_string(),
            summary: summary.map(ToString::to_string),
            image_url: None,
            published_at: None,
        }
    }

    fn settings() -> Settings {
        Settings {
            user_id: "user-1".to_string(),
            ai_provider: "google".to_string(),
            openai_api_key: None,
            google_api_key: Some("key".to_string()),
            anthropic_api_key: None,
            ai_prompt: "Write a blog post.".to_string(),
            ai_temperature: 0.7,
            ai_word_count_min: 800,
            ai_word_count_max: 1500,
            auto_publish: false,
            post_frequency: 30,
            publish_delay_minutes: 0,
            wordpress_url: None,
            wordpress_username: None,
            wordpress_password: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_build_prompt_includes_template_and_entry() {
        let prompt = build_prompt(&settings(), &entry(Some("Entry body text")));
        assert!(prompt.starts_with("Write a blog post."));
        assert!(prompt.contains("Source title: Original title"));
        assert!(prompt.contains("Source content: Entry body text"));
    }

    #[test]
    fn test_build_prompt_without_summary() {
        let prompt = build_prompt(&settings(), &entry(None));
        assert!(prompt.contains("Source title: Original title"));
        assert!(!prompt.contains("Source content:"));
    }
}
