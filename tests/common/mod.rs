//! Shared fixtures for integration tests: a temp-file database, mock AI
//! and publishing capabilities, and canned feed documents.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rss_ai_publisher::ai::{AiProvider, GeneratedArticle, GenerationError, GenerationRequest};
use rss_ai_publisher::db::{insert_feed, Database, NewFeed};
use rss_ai_publisher::pipeline::{CapabilitySet, Pipeline, SettingsError};
use rss_ai_publisher::publisher::{PublishError, PublishRequest, Publisher, RetryPolicy};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

/// Feed with one entry: id "abc123", title "X".
pub const SINGLE_ENTRY_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://www.reddit.com/r/test</link>
    <item>
      <title>X</title>
      <link>https://www.reddit.com/r/test/comments/abc123</link>
      <guid isPermaLink="false">abc123</guid>
      <description><![CDATA[<p>Entry body.</p>]]></description>
    </item>
  </channel>
</rss>"#;

/// Feed with two entries; the first one's title trips the mock AI.
pub const TWO_ENTRY_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://www.reddit.com/r/test</link>
    <item>
      <title>boom story</title>
      <link>https://www.reddit.com/r/test/comments/e1</link>
      <guid isPermaLink="false">e1</guid>
      <description><![CDATA[First body.]]></description>
    </item>
    <item>
      <title>Second story</title>
      <link>https://www.reddit.com/r/test/comments/e2</link>
      <guid isPermaLink="false">e2</guid>
      <description><![CDATA[Second body.]]></description>
    </item>
  </channel>
</rss>"#;

/// Serve a feed document at `/feed.rss`, optionally delaying each
/// response.
pub async fn mount_feed(server: &MockServer, body: &str, delay: Option<Duration>) {
    let mut template = ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml");
    if let Some(delay) = delay {
        template = template.set_delay(delay);
    }
    Mock::given(method("GET"))
        .and(path("/feed.rss"))
        .respond_with(template)
        .mount(server)
        .await;
}

pub async fn insert_test_feed(db: &Database, user_id: &str, server: &MockServer) -> i64 {
    insert_feed(
        db.pool(),
        &NewFeed {
            user_id: user_id.to_string(),
            url: format!("{}/feed.rss", server.uri()),
            name: "Test feed".to_string(),
            category: None,
        },
    )
    .await
    .expect("Failed to insert feed")
}

/// Deterministic AI capability: echoes the source title with an " - AI"
/// suffix, or fails when the prompt mentions "boom".
#[derive(Clone, Default)]
pub struct MockAi {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl AiProvider for MockAi {
    fn provider_id(&self) -> &'static str {
        "mock"
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArticle, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.prompt.contains("boom") {
            return Err(GenerationError::EmptyPayload);
        }
        let source_title = request
            .prompt
            .split("Source title: ")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap_or("untitled");
        Ok(GeneratedArticle {
            title: format!("{source_title} - AI"),
            html: "<p>Generated body.</p>".to_string(),
            summary: "A short summary.".to_string(),
            seo_score: Some(80),
        })
    }
}

/// Scripted publishing capability: pops one result per call, counting
/// calls; an exhausted script publishes successfully with id 1.
#[derive(Clone, Default)]
pub struct MockPublisher {
    results: Arc<Mutex<VecDeque<Result<i64, u16>>>>,
    pub calls: Arc<AtomicUsize>,
}

impl MockPublisher {
    pub fn returning(results: Vec<Result<i64, u16>>) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.into_iter().collect())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, _request: &PublishRequest) -> Result<i64, PublishError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .results
            .lock()
            .expect("results mutex poisoned")
            .pop_front();
        match next {
            Some(Ok(id)) => Ok(id),
            Some(Err(status)) => Err(PublishError::Rejected {
                status,
                message: "server error".to_string(),
            }),
            None => Ok(1),
        }
    }
}

pub struct MockCapabilities {
    pub ai: MockAi,
    pub publisher: MockPublisher,
}

impl CapabilitySet for MockCapabilities {
    fn ai_provider(
        &self,
        _settings: &rss_ai_publisher::db::Settings,
    ) -> Result<Box<dyn AiProvider>, SettingsError> {
        Ok(Box::new(self.ai.clone()))
    }

    fn publisher(
        &self,
        _settings: &rss_ai_publisher::db::Settings,
    ) -> Result<Box<dyn Publisher>, SettingsError> {
        Ok(Box::new(self.publisher.clone()))
    }
}

/// Pipeline wired to the mock capabilities with a fast retry policy.
pub fn test_pipeline(db: &Database, publisher: MockPublisher) -> Pipeline {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build client");
    Pipeline::new(
        db.clone(),
        client,
        Arc::new(MockCapabilities {
            ai: MockAi::default(),
            publisher,
        }),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            multiplier: 4,
        },
    )
}
