use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured RSS feed owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Feed {
    pub id: i64,
    pub user_id: String,
    pub url: String,
    pub name: String,
    /// Target category label on the content host.
    pub category: Option<String>,
    pub created_at: String,
}

/// Data for inserting a new feed.
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub user_id: String,
    pub url: String,
    pub name: String,
    pub category: Option<String>,
}

/// Lifecycle status of a post.
///
/// `draft -> generated -> published`, with `error` reachable from any
/// non-terminal state and re-enterable into `generated` by manual retry.
/// `published` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Generated,
    Published,
    Error,
}

impl PostStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generated => "generated",
            Self::Published => "published",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "generated" => Some(Self::Generated),
            "published" => Some(Self::Published),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        *self == Self::Published
    }

    /// Whether the state machine permits moving from `self` to `to`.
    #[must_use]
    pub fn can_transition(&self, to: Self) -> bool {
        match self {
            Self::Draft => matches!(to, Self::Generated | Self::Published | Self::Error),
            Self::Generated => matches!(to, Self::Published | Self::Error),
            // Manual retry re-enters the machine at `generated`.
            Self::Error => matches!(to, Self::Generated),
            Self::Published => false,
        }
    }
}

/// A pipeline-managed content unit generated from one feed entry.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: String,
    pub feed_id: i64,
    /// Source-stable identifier of the feed entry this post came from.
    pub entry_id: String,
    pub title: String,
    pub summary: Option<String>,
    /// Generated HTML body.
    pub content: Option<String>,
    pub seo_score: Option<i64>,
    pub image_url: Option<String>,
    pub image_alt_text: Option<String>,
    pub status: String,
    /// Remote post id on the content host, once published.
    pub wordpress_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    #[must_use]
    pub fn status_enum(&self) -> Option<PostStatus> {
        PostStatus::from_str(&self.status)
    }

    /// Creation time parsed back to UTC, if the stored value is valid.
    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Data for inserting a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: String,
    pub feed_id: i64,
    pub entry_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub seo_score: Option<i64>,
    pub image_url: Option<String>,
    pub image_alt_text: Option<String>,
    pub status: PostStatus,
}

/// Severity of an audit log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// One entry in a post's append-only audit log.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostLog {
    pub id: i64,
    pub post_id: i64,
    pub level: String,
    pub message: String,
    pub created_at: String,
}

/// Per-user pipeline configuration. Exactly one row per user, created
/// with defaults on first access.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Settings {
    pub user_id: String,
    pub ai_provider: String,
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub ai_prompt: String,
    pub ai_temperature: f64,
    pub ai_word_count_min: i64,
    pub ai_word_count_max: i64,
    pub auto_publish: bool,
    /// Feed refresh cadence in minutes. Values below the floor are
    /// clamped at read time, not rejected.
    pub post_frequency: i64,
    pub publish_delay_minutes: i64,
    pub wordpress_url: Option<String>,
    pub wordpress_username: Option<String>,
    pub wordpress_password: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Settings {
    /// Floor for the feed refresh cadence.
    pub const MIN_POST_FREQUENCY_MINUTES: i64 = 15;

    /// Effective scheduler period, with the cadence floor applied.
    #[must_use]
    pub fn effective_frequency(&self) -> Duration {
        let minutes = self.post_frequency.max(Self::MIN_POST_FREQUENCY_MINUTES);
        Duration::from_secs(u64::try_from(minutes).unwrap_or(0) * 60)
    }

    /// Effective publish delay, floored at zero.
    #[must_use]
    pub fn effective_publish_delay(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.publish_delay_minutes.max(0))
    }

    /// The API key configured for the selected AI provider, if any.
    #[must_use]
    pub fn api_key_for_provider(&self) -> Option<&str> {
        let key = match self.ai_provider.as_str() {
            "openai" => self.openai_api_key.as_deref(),
            "google" => self.google_api_key.as_deref(),
            "anthropic" => self.anthropic_api_key.as_deref(),
            _ => None,
        };
        key.filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            PostStatus::Draft,
            PostStatus::Generated,
            PostStatus::Published,
            PostStatus::Error,
        ] {
            assert_eq!(PostStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PostStatus::from_str("bogus"), None);
    }

    #[test]
    fn test_status_transitions() {
        assert!(PostStatus::Draft.can_transition(PostStatus::Generated));
        assert!(PostStatus::Draft.can_transition(PostStatus::Published));
        assert!(PostStatus::Draft.can_transition(PostStatus::Error));
        assert!(PostStatus::Generated.can_transition(PostStatus::Published));
        assert!(PostStatus::Generated.can_transition(PostStatus::Error));
        assert!(PostStatus::Error.can_transition(PostStatus::Generated));

        // Published is terminal.
        assert!(!PostStatus::Published.can_transition(PostStatus::Draft));
        assert!(!PostStatus::Published.can_transition(PostStatus::Error));
        // No skipping backwards.
        assert!(!PostStatus::Generated.can_transition(PostStatus::Draft));
        assert!(!PostStatus::Error.can_transition(PostStatus::Published));
    }

    #[test]
    fn test_cadence_clamp() {
        let mut settings = test_settings();
        settings.post_frequency = 5;
        assert_eq!(settings.effective_frequency(), Duration::from_secs(15 * 60));

        settings.post_frequency = 30;
        assert_eq!(settings.effective_frequency(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn test_publish_delay_floor() {
        let mut settings = test_settings();
        settings.publish_delay_minutes = -10;
        assert_eq!(settings.effective_publish_delay(), chrono::Duration::zero());
    }

    #[test]
    fn test_api_key_selection() {
        let mut settings = test_settings();
        settings.ai_provider = "openai".to_string();
        settings.openai_api_key = Some("sk-test".to_string());
        assert_eq!(settings.api_key_for_provider(), Some("sk-test"));

        settings.ai_provider = "google".to_string();
        assert_eq!(settings.api_key_for_provider(), None);

        settings.google_api_key = Some(String::new());
        assert_eq!(settings.api_key_for_provider(), None);
    }

    fn test_settings() -> Settings {
        Settings {
            user_id: "user-1".to_string(),
            ai_provider: "google".to_string(),
            openai_api_key: None,
            google_api_key: None,
            anthropic_api_key: None,
            ai_prompt: String::new(),
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
}
