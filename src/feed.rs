//! Feed fetching and parsing. Stateless: one fetch is one full re-read
//! of the feed, and the ledger is never touched from here.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch feed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("feed fetch returned HTTP {status}")]
    Status { status: u16 },
    #[error("failed to parse feed: {0}")]
    Malformed(#[from] feed_rs::parser::ParseFeedError),
}

/// One item read from a feed.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    /// Source-stable external identifier.
    pub id: String,
    pub title: String,
    pub summary: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetch a feed and return its entries in document order.
///
/// The client's timeout bounds the fetch; exceeding it surfaces as a
/// `FetchError`, never a hang.
pub async fn fetch_entries(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<FeedEntry>, FetchError> {
    debug!(url, "Fetching feed");

    let response = client
        .get(url)
        .header("User-Agent", "rss-ai-publisher/0.1")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            status: response.status().as_u16(),
        });
    }

    let body = response.bytes().await?;
    parse_entries(&body)
}

/// Parse a raw feed document into entries, preserving document order.
pub fn parse_entries(body: &[u8]) -> Result<Vec<FeedEntry>, FetchError> {
    let feed = feed_rs::parser::parse(body)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_default();
            let summary = entry
                .summary
                .as_ref()
                .map(|s| s.content.clone())
                .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()));
            let image_url = extract_image(&entry);

            FeedEntry {
                id: entry.id,
                title,
                summary,
                image_url,
                published_at: entry.published,
            }
        })
        .collect();

    Ok(entries)
}

/// First usable image from the entry's media objects, if any.
fn extract_image(entry: &feed_rs::model::Entry) -> Option<String> {
    entry.media.iter().find_map(|media| {
        media
            .content
            .iter()
            .find_map(|c| c.url.as_ref().map(ToString::to_string))
            .or_else(|| media.thumbnails.first().map(|t| t.image.uri.clone()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Test Subreddit</title>
    <link>https://www.reddit.com/r/test</link>
    <item>
      <title>First post</title>
      <link>https://www.reddit.com/r/test/comments/abc123</link>
      <guid isPermaLink="false">t3_abc123</guid>
      <pubDate>Mon, 01 Jan 2024 12:00:00 +0000</pubDate>
      <description><![CDATA[<p>Some interesting content.</p>]]></description>
      <media:thumbnail url="https://example.com/thumb.jpg"/>
    </item>
    <item>
      <title>Second post</title>
      <link>https://www.reddit.com/r/test/comments/def456</link>
      <guid isPermaLink="false">t3_def456</guid>
      <description><![CDATA[More content here.]]></description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_entries_preserves_order() {
        let entries = parse_entries(SAMPLE_RSS.as_bytes()).expect("parse failed");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "t3_abc123");
        assert_eq!(entries[0].title, "First post");
        assert_eq!(entries[1].id, "t3_def456");
    }

    #[test]
    fn test_parse_entries_extracts_fields() {
        let entries = parse_entries(SAMPLE_RSS.as_bytes()).expect("parse failed");
        let first = &entries[0];
        assert!(first
            .summary
            .as_deref()
            .unwrap_or_default()
            .contains("interesting content"));
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://example.com/thumb.jpg")
        );
        assert!(first.published_at.is_some());

        let second = &entries[1];
        assert!(second.image_url.is_none());
        assert!(second.published_at.is_none());
    }

    #[test]
    fn test_parse_entries_rejects_garbage() {
        assert!(parse_entries(b"not a feed <><>").is_err());
    }
}
