use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use super::models::{Feed, LogLevel, NewFeed, NewPost, Post, PostLog, PostStatus, Settings};

/// Maximum audit log entries retained per post; older rows are pruned on
/// append.
pub const POST_LOG_CAP: i64 = 200;

/// Default content generation prompt for newly created settings.
pub const DEFAULT_AI_PROMPT: &str = "Create an engaging, SEO-optimized blog post based on this \
    feed entry. Make it informative, well-structured with proper headings, and include relevant \
    keywords naturally.";

fn now() -> String {
    Utc::now().to_rfc3339()
}

// ========== Feeds ==========

/// Insert a new feed, returning its ID.
pub async fn insert_feed(pool: &SqlitePool, feed: &NewFeed) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO feeds (user_id, url, name, category, created_at)
        VALUES (?, ?, ?, ?, ?)
        ",
    )
    .bind(&feed.user_id)
    .bind(&feed.url)
    .bind(&feed.name)
    .bind(&feed.category)
    .bind(now())
    .execute(pool)
    .await
    .context("Failed to insert feed")?;

    Ok(result.last_insert_rowid())
}

/// Get a feed by ID.
pub async fn get_feed(pool: &SqlitePool, id: i64) -> Result<Option<Feed>> {
    sqlx::query_as("SELECT * FROM feeds WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch feed")
}

/// List every stored feed, oldest first.
pub async fn list_feeds(pool: &SqlitePool) -> Result<Vec<Feed>> {
    sqlx::query_as("SELECT * FROM feeds ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list feeds")
}

/// List a user's feeds, oldest first.
pub async fn list_feeds_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Feed>> {
    sqlx::query_as("SELECT * FROM feeds WHERE user_id = ? ORDER BY id")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list feeds for user")
}

/// Delete a feed. Its posts and ledger entries are removed by cascade.
pub async fn delete_feed(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM feeds WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete feed")?;

    Ok(())
}

// ========== Dedup ledger ==========

/// Whether the ledger already holds this (feed, entry id) pair.
pub async fn ledger_contains(pool: &SqlitePool, feed_id: i64, entry_id: &str) -> Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM seen_entries WHERE feed_id = ? AND entry_id = ?")
            .bind(feed_id)
            .bind(entry_id)
            .fetch_optional(pool)
            .await
            .context("Failed to check ledger")?;

    Ok(row.is_some())
}

/// Create a post and its ledger entry as one atomic unit, appending the
/// initial audit log entry in the same transaction.
///
/// Returns `None` without writing anything if the ledger already holds
/// the pair (duplicate entry in a batch, or a concurrent run won).
pub async fn create_post_with_ledger(
    pool: &SqlitePool,
    post: &NewPost,
    log_level: LogLevel,
    log_message: &str,
) -> Result<Option<i64>> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin post creation transaction")?;

    let timestamp = now();

    let marked = sqlx::query(
        r"
        INSERT OR IGNORE INTO seen_entries (feed_id, entry_id, created_at)
        VALUES (?, ?, ?)
        ",
    )
    .bind(post.feed_id)
    .bind(&post.entry_id)
    .bind(&timestamp)
    .execute(&mut *tx)
    .await
    .context("Failed to insert ledger entry")?;

    if marked.rows_affected() == 0 {
        tx.rollback()
            .await
            .context("Failed to roll back duplicate entry")?;
        return Ok(None);
    }

    let inserted = sqlx::query(
        r"
        INSERT INTO posts (
            user_id, feed_id, entry_id, title, summary, content, seo_score,
            image_url, image_alt_text, status, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&post.user_id)
    .bind(post.feed_id)
    .bind(&post.entry_id)
    .bind(&post.title)
    .bind(&post.summary)
    .bind(&post.content)
    .bind(post.seo_score)
    .bind(&post.image_url)
    .bind(&post.image_alt_text)
    .bind(post.status.as_str())
    .bind(&timestamp)
    .bind(&timestamp)
    .execute(&mut *tx)
    .await
    .context("Failed to insert post")?;

    let post_id = inserted.last_insert_rowid();

    sqlx::query(
        r"
        INSERT INTO post_logs (post_id, level, message, created_at)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(post_id)
    .bind(log_level.as_str())
    .bind(log_message)
    .bind(&timestamp)
    .execute(&mut *tx)
    .await
    .context("Failed to insert initial audit entry")?;

    tx.commit()
        .await
        .context("Failed to commit post creation")?;

    Ok(Some(post_id))
}

// ========== Posts ==========

/// Get a post by ID.
pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")
}

/// List a feed's posts, newest first.
pub async fn list_posts_for_feed(pool: &SqlitePool, feed_id: i64) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE feed_id = ? ORDER BY id DESC")
        .bind(feed_id)
        .fetch_all(pool)
        .await
        .context("Failed to list posts for feed")
}

/// Posts still in `draft` for a feed, oldest first, for the auto-publish
/// sweep on each tick.
pub async fn get_draft_posts(pool: &SqlitePool, feed_id: i64) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE feed_id = ? AND status = 'draft' ORDER BY id")
        .bind(feed_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch draft posts")
}

/// Update a post's status.
pub async fn set_post_status(pool: &SqlitePool, id: i64, status: PostStatus) -> Result<()> {
    sqlx::query("UPDATE posts SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update post status")?;

    Ok(())
}

/// Mark a post published and record the remote host id.
pub async fn set_post_published(pool: &SqlitePool, id: i64, wordpress_id: i64) -> Result<()> {
    sqlx::query(
        r"
        UPDATE posts
        SET status = 'published', wordpress_id = ?, updated_at = ?
        WHERE id = ?
        ",
    )
    .bind(wordpress_id)
    .bind(now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to mark post published")?;

    Ok(())
}

/// Delete a post by explicit user action.
pub async fn delete_post(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;

    Ok(())
}

// ========== Audit log ==========

/// Append an entry to a post's audit log, pruning entries beyond the cap.
pub async fn append_post_log(
    pool: &SqlitePool,
    post_id: i64,
    level: LogLevel,
    message: &str,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO post_logs (post_id, level, message, created_at)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(post_id)
    .bind(level.as_str())
    .bind(message)
    .bind(now())
    .execute(pool)
    .await
    .context("Failed to append audit entry")?;

    sqlx::query(
        r"
        DELETE FROM post_logs
        WHERE post_id = ?
          AND id NOT IN (
            SELECT id FROM post_logs WHERE post_id = ? ORDER BY id DESC LIMIT ?
          )
        ",
    )
    .bind(post_id)
    .bind(post_id)
    .bind(POST_LOG_CAP)
    .execute(pool)
    .await
    .context("Failed to prune audit log")?;

    Ok(())
}

/// A post's audit log in append order.
pub async fn get_post_logs(pool: &SqlitePool, post_id: i64) -> Result<Vec<PostLog>> {
    sqlx::query_as("SELECT * FROM post_logs WHERE post_id = ? ORDER BY id")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch audit log")
}

// ========== Settings ==========

/// Fetch a user's settings, creating the row with defaults on first access.
pub async fn get_or_create_settings(pool: &SqlitePool, user_id: &str) -> Result<Settings> {
    if let Some(settings) = sqlx::query_as("SELECT * FROM user_settings WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch settings")?
    {
        return Ok(settings);
    }

    let timestamp = now();
    sqlx::query(
        r"
        INSERT OR IGNORE INTO user_settings (user_id, ai_prompt, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(user_id)
    .bind(DEFAULT_AI_PROMPT)
    .bind(&timestamp)
    .bind(&timestamp)
    .execute(pool)
    .await
    .context("Failed to create default settings")?;

    sqlx::query_as("SELECT * FROM user_settings WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to fetch settings after creation")
}

/// Overwrite a user's settings. This is the write path of the external
/// settings-editing surface; the pipeline itself never calls it.
pub async fn update_settings(pool: &SqlitePool, settings: &Settings) -> Result<()> {
    sqlx::query(
        r"
        UPDATE user_settings
        SET ai_provider = ?, openai_api_key = ?, google_api_key = ?, anthropic_api_key = ?,
            ai_prompt = ?, ai_temperature = ?, ai_word_count_min = ?, ai_word_count_max = ?,
            auto_publish = ?, post_frequency = ?, publish_delay_minutes = ?,
            wordpress_url = ?, wordpress_username = ?, wordpress_password = ?, updated_at = ?
        WHERE user_id = ?
        ",
    )
    .bind(&settings.ai_provider)
    .bind(&settings.openai_api_key)
    .bind(&settings.google_api_key)
    .bind(&settings.anthropic_api_key)
    .bind(&settings.ai_prompt)
    .bind(settings.ai_temperature)
    .bind(settings.ai_word_count_min)
    .bind(settings.ai_word_count_max)
    .bind(settings.auto_publish)
    .bind(settings.post_frequency)
    .bind(settings.publish_delay_minutes)
    .bind(&settings.wordpress_url)
    .bind(&settings.wordpress_username)
    .bind(&settings.wordpress_password)
    .bind(now())
    .bind(&settings.user_id)
    .execute(pool)
    .await
    .context("Failed to update settings")?;

    Ok(())
}
