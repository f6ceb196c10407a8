use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating initial schema");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS feeds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            url TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, url)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create feeds table")?;

    // Dedup ledger: one row per (feed, external entry id), written in the
    // same transaction as the post it produced.
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS seen_entries (
            feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
            entry_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (feed_id, entry_id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create seen_entries table")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
            entry_id TEXT NOT NULL,
            title TEXT NOT NULL,
            summary TEXT,
            content TEXT,
            seo_score INTEGER,
            image_url TEXT,
            image_alt_text TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            wordpress_id INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posts table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_feed_status ON posts(feed_id, status)")
        .execute(pool)
        .await
        .context("Failed to create posts index")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS post_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            level TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create post_logs table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_post_logs_post ON post_logs(post_id)")
        .execute(pool)
        .await
        .context("Failed to create post_logs index")?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS user_settings (
            user_id TEXT PRIMARY KEY,
            ai_provider TEXT NOT NULL DEFAULT 'google',
            openai_api_key TEXT,
            google_api_key TEXT,
            anthropic_api_key TEXT,
            ai_prompt TEXT NOT NULL,
            ai_temperature REAL NOT NULL DEFAULT 0.7,
            ai_word_count_min INTEGER NOT NULL DEFAULT 800,
            ai_word_count_max INTEGER NOT NULL DEFAULT 1500,
            auto_publish INTEGER NOT NULL DEFAULT 0,
            post_frequency INTEGER NOT NULL DEFAULT 30,
            publish_delay_minutes INTEGER NOT NULL DEFAULT 0,
            wordpress_url TEXT,
            wordpress_username TEXT,
            wordpress_password TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create user_settings table")?;

    Ok(())
}
