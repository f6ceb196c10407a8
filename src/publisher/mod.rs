//! Publish orchestration: drives posts through the lifecycle state
//! machine, enforces the publish delay and retries the publishing
//! capability with exponential backoff before settling in `error`.

mod wordpress;

pub use wordpress::WordPressPublisher;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::{
    append_post_log, get_post, set_post_published, set_post_status, Database, LogLevel, Post,
    PostStatus, Settings,
};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("host rejected publish with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("host returned a malformed response: {0}")]
    Malformed(String),
}

/// One publish call's inputs. Credentials live in the implementation,
/// never in the request, so they cannot leak into audit messages.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub title: String,
    pub html: String,
    pub image_url: Option<String>,
    /// Best-effort idempotency token derived from the post identity, so
    /// a well-behaved host can deduplicate a retried call. At-least-once
    /// semantics are accepted.
    pub idempotency_key: String,
}

/// A configured publishing capability.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish an article, returning the remote host's post id.
    async fn publish(&self, request: &PublishRequest) -> Result<i64, PublishError>;
}

/// Retry policy for publish failures. The defaults give 1s, 4s, 16s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 4,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after the given 1-based attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Result of driving one post through a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Published; carries the remote host id.
    Published(i64),
    /// All attempts failed; the post settled in `error`.
    Exhausted,
    /// The post was not eligible (wrong state, delay pending, or
    /// auto-publish disabled).
    NotEligible,
}

/// Whether the publish delay has elapsed for a post.
///
/// Measured against wall-clock time since post creation, not since the
/// scheduler tick. An unparseable timestamp counts as not yet eligible.
#[must_use]
pub fn delay_elapsed(post: &Post, settings: &Settings) -> bool {
    let Some(created_at) = post.created_at_utc() else {
        warn!(post_id = post.id, "Post has unparseable created_at");
        return false;
    };
    Utc::now() - created_at >= settings.effective_publish_delay()
}

/// Auto-publish a post if settings and the delay allow it.
pub async fn maybe_auto_publish(
    db: &Database,
    publisher: &dyn Publisher,
    settings: &Settings,
    post: &Post,
    retry: &RetryPolicy,
) -> Result<PublishOutcome> {
    if !settings.auto_publish {
        return Ok(PublishOutcome::NotEligible);
    }
    if !delay_elapsed(post, settings) {
        debug!(post_id = post.id, "Publish delay not yet elapsed");
        return Ok(PublishOutcome::NotEligible);
    }
    publish_post(db, publisher, post, retry).await
}

/// Publish a post on explicit user request. The delay is not enforced on
/// the manual path.
pub async fn manual_publish(
    db: &Database,
    publisher: &dyn Publisher,
    post_id: i64,
    retry: &RetryPolicy,
) -> Result<PublishOutcome> {
    let post = get_post(db.pool(), post_id)
        .await?
        .context("Post not found")?;
    publish_post(db, publisher, &post, retry).await
}

/// Drive one post through the publish transition with retries.
///
/// Each failed attempt is audited; after exhausting the policy the post
/// settles in `error`. Success records the remote id and audits
/// "published".
pub async fn publish_post(
    db: &Database,
    publisher: &dyn Publisher,
    post: &Post,
    retry: &RetryPolicy,
) -> Result<PublishOutcome> {
    let Some(status) = post.status_enum() else {
        warn!(post_id = post.id, status = %post.status, "Post has unknown status");
        return Ok(PublishOutcome::NotEligible);
    };
    if !status.can_transition(PostStatus::Published) {
        debug!(post_id = post.id, status = %post.status, "Post not publishable from this state");
        return Ok(PublishOutcome::NotEligible);
    }

    let request = PublishRequest {
        title: post.title.clone(),
        html: post.content.clone().unwrap_or_default(),
        image_url: post.image_url.clone(),
        idempotency_key: format!("post-{}", post.id),
    };

    for attempt in 1..=retry.max_attempts {
        match publisher.publish(&request).await {
            Ok(remote_id) => {
                set_post_published(db.pool(), post.id, remote_id).await?;
                append_post_log(db.pool(), post.id, LogLevel::Info, "published").await?;
                info!(post_id = post.id, remote_id, "Post published");
                return Ok(PublishOutcome::Published(remote_id));
            }
            Err(e) => {
                warn!(post_id = post.id, attempt, "Publish attempt failed: {e}");
                append_post_log(
                    db.pool(),
                    post.id,
                    LogLevel::Warn,
                    &format!("publish attempt {attempt} failed: {e}"),
                )
                .await?;
                if attempt < retry.max_attempts {
                    tokio::time::sleep(retry.delay(attempt)).await;
                }
            }
        }
    }

    set_post_status(db.pool(), post.id, PostStatus::Error).await?;
    append_post_log(
        db.pool(),
        post.id,
        LogLevel::Error,
        &format!("publish failed after {} attempts", retry.max_attempts),
    )
    .await?;

    Ok(PublishOutcome::Exhausted)
}
