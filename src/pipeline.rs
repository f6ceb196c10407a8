//! Pipeline coordinator: one run takes a feed through fetch, dedup,
//! generation and the auto-publish sweep. Capability selection happens
//! here, once per run, from the user's settings snapshot.

use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{info, warn};

use crate::ai::{AiProvider, AnthropicProvider, GoogleProvider, OpenAiProvider};
use crate::db::{
    create_post_with_ledger, get_draft_posts, get_feed, get_or_create_settings, ledger_contains,
    Database, Feed, LogLevel, NewPost, PostStatus, Settings,
};
use crate::feed::{fetch_entries, FeedEntry};
use crate::generator::generate_article;
use crate::publisher::{
    manual_publish, maybe_auto_publish, PublishOutcome, Publisher, RetryPolicy, WordPressPublisher,
};

/// A capability cannot be built from the user's settings. Raised before
/// any network call, so a misconfigured run leaves no partial state.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("unknown AI provider {provider:?}")]
    UnknownProvider { provider: String },
    #[error("no API key configured for AI provider {provider:?}")]
    MissingApiKey { provider: String },
    #[error("publishing host credentials are incomplete")]
    MissingPublisherCredentials,
}

/// Builds the AI and publishing capabilities for a run from a settings
/// snapshot. Production uses [`DefaultCapabilities`]; tests substitute
/// mocks.
pub trait CapabilitySet: Send + Sync {
    fn ai_provider(&self, settings: &Settings) -> Result<Box<dyn AiProvider>, SettingsError>;
    fn publisher(&self, settings: &Settings) -> Result<Box<dyn Publisher>, SettingsError>;
}

/// Real providers and the WordPress publisher, selected by settings.
pub struct DefaultCapabilities {
    client: reqwest::Client,
}

impl DefaultCapabilities {
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl CapabilitySet for DefaultCapabilities {
    fn ai_provider(&self, settings: &Settings) -> Result<Box<dyn AiProvider>, SettingsError> {
        let api_key = settings
            .api_key_for_provider()
            .ok_or_else(|| SettingsError::MissingApiKey {
                provider: settings.ai_provider.clone(),
            })?
            .to_string();

        match settings.ai_provider.as_str() {
            "google" => Ok(Box::new(GoogleProvider::new(self.client.clone(), api_key))),
            "openai" => Ok(Box::new(OpenAiProvider::new(self.client.clone(), api_key))),
            "anthropic" => Ok(Box::new(AnthropicProvider::new(
                self.client.clone(),
                api_key,
            ))),
            other => Err(SettingsError::UnknownProvider {
                provider: other.to_string(),
            }),
        }
    }

    fn publisher(&self, settings: &Settings) -> Result<Box<dyn Publisher>, SettingsError> {
        let (Some(url), Some(username), Some(password)) = (
            settings.wordpress_url.as_deref(),
            settings.wordpress_username.as_deref(),
            settings.wordpress_password.as_deref(),
        ) else {
            return Err(SettingsError::MissingPublisherCredentials);
        };
        if url.is_empty() || username.is_empty() || password.is_empty() {
            return Err(SettingsError::MissingPublisherCredentials);
        }

        Ok(Box::new(WordPressPublisher::new(
            self.client.clone(),
            url.to_string(),
            username.to_string(),
            password.to_string(),
        )))
    }
}

/// Counters from one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries read from the feed.
    pub fetched: usize,
    /// New posts created (ledger misses).
    pub created: usize,
    /// Posts published during this run.
    pub published: usize,
    /// Entries or publishes that failed.
    pub failed: usize,
}

#[derive(Clone)]
pub struct Pipeline {
    db: Database,
    client: reqwest::Client,
    capabilities: Arc<dyn CapabilitySet>,
    retry: RetryPolicy,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        db: Database,
        client: reqwest::Client,
        capabilities: Arc<dyn CapabilitySet>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            client,
            capabilities,
            retry,
        }
    }

    /// Run the full pipeline once for one feed.
    ///
    /// Settings are snapshotted at the start of the run. Capabilities are
    /// validated before any network call, so a missing credential fails
    /// the run with no partial state. Each entry's failure is isolated:
    /// a failed generation lands that post in `error` and the run
    /// continues with the next entry.
    pub async fn run_feed(&self, feed_id: i64) -> Result<RunSummary> {
        let feed = get_feed(self.db.pool(), feed_id)
            .await?
            .context("Feed not found")?;
        let settings = get_or_create_settings(self.db.pool(), &feed.user_id).await?;

        let ai = self.capabilities.ai_provider(&settings)?;
        let publisher = if settings.auto_publish {
            Some(self.capabilities.publisher(&settings)?)
        } else {
            None
        };

        let entries = fetch_entries(&self.client, &feed.url)
            .await
            .with_context(|| format!("Failed to fetch feed {}", feed.url))?;

        let mut summary = RunSummary {
            fetched: entries.len(),
            ..RunSummary::default()
        };

        for entry in &entries {
            if ledger_contains(self.db.pool(), feed.id, &entry.id).await? {
                continue;
            }
            match self
                .process_entry(&feed, &settings, ai.as_ref(), entry)
                .await?
            {
                EntryOutcome::Created => summary.created += 1,
                EntryOutcome::Failed => summary.failed += 1,
                EntryOutcome::Duplicate => {}
            }
        }

        // Re-sweep every pending draft, not just this run's, so posts
        // whose publish delay elapsed between ticks still go out.
        if let Some(publisher) = publisher {
            for post in get_draft_posts(self.db.pool(), feed.id).await? {
                match maybe_auto_publish(
                    &self.db,
                    publisher.as_ref(),
                    &settings,
                    &post,
                    &self.retry,
                )
                .await?
                {
                    PublishOutcome::Published(_) => summary.published += 1,
                    PublishOutcome::Exhausted => summary.failed += 1,
                    PublishOutcome::NotEligible => {}
                }
            }
        }

        info!(
            feed_id = feed.id,
            user_id = %feed.user_id,
            fetched = summary.fetched,
            created = summary.created,
            published = summary.published,
            failed = summary.failed,
            "Feed run complete"
        );

        Ok(summary)
    }

    /// Generate a draft for one new entry. Generation failure records an
    /// `error` post behind the same ledger entry, so the entry is not
    /// re-attempted endlessly on every tick.
    async fn process_entry(
        &self,
        feed: &Feed,
        settings: &Settings,
        ai: &dyn AiProvider,
        entry: &FeedEntry,
    ) -> Result<EntryOutcome> {
        match generate_article(ai, settings, entry).await {
            Ok(article) => {
                let post = NewPost {
                    user_id: feed.user_id.clone(),
                    feed_id: feed.id,
                    entry_id: entry.id.clone(),
                    title: article.title,
                    summary: (!article.summary.is_empty()).then_some(article.summary),
                    content: Some(article.html),
                    seo_score: article.seo_score,
                    image_url: entry.image_url.clone(),
                    image_alt_text: entry.image_url.is_some().then(|| entry.title.clone()),
                    status: PostStatus::Draft,
                };
                let created =
                    create_post_with_ledger(self.db.pool(), &post, LogLevel::Info, "generated")
                        .await?;
                Ok(match created {
                    Some(post_id) => {
                        info!(feed_id = feed.id, post_id, entry_id = %entry.id, "Draft created");
                        EntryOutcome::Created
                    }
                    // Duplicate entry id within the batch, or a
                    // concurrent run won the ledger race.
                    None => EntryOutcome::Duplicate,
                })
            }
            Err(e) => {
                warn!(feed_id = feed.id, entry_id = %entry.id, "Generation failed: {e}");
                let post = NewPost {
                    user_id: feed.user_id.clone(),
                    feed_id: feed.id,
                    entry_id: entry.id.clone(),
                    title: entry.title.clone(),
                    summary: entry.summary.clone(),
                    content: None,
                    seo_score: None,
                    image_url: entry.image_url.clone(),
                    image_alt_text: None,
                    status: PostStatus::Error,
                };
                create_post_with_ledger(
                    self.db.pool(),
                    &post,
                    LogLevel::Error,
                    &format!("generation failed: {e}"),
                )
                .await?;
                Ok(EntryOutcome::Failed)
            }
        }
    }

    /// Publish one post immediately on user request, bypassing the delay.
    pub async fn publish_post_now(&self, user_id: &str, post_id: i64) -> Result<PublishOutcome> {
        let settings = get_or_create_settings(self.db.pool(), user_id).await?;
        let publisher = self.capabilities.publisher(&settings)?;
        manual_publish(&self.db, publisher.as_ref(), post_id, &self.retry).await
    }

    #[must_use]
    pub const fn db(&self) -> &Database {
        &self.db
    }
}

enum EntryOutcome {
    Created,
    Failed,
    Duplicate,
}
