use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rss_ai_publisher::config::Config;
use rss_ai_publisher::db::{self, Database};
use rss_ai_publisher::pipeline::{DefaultCapabilities, Pipeline};
use rss_ai_publisher::publisher::RetryPolicy;
use rss_ai_publisher::scheduler::Scheduler;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting rss-ai-publisher");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    info!(path = %config.database_path.display(), "Database initialized");

    // Feed fetches are quick; generation and publishing get a longer
    // budget on their own client.
    let fetch_client = reqwest::Client::builder()
        .timeout(config.fetch_timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build fetch HTTP client")?;
    let api_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build API HTTP client")?;

    let retry = RetryPolicy {
        max_attempts: config.publish_retry_attempts,
        base_delay: config.publish_retry_base,
        ..RetryPolicy::default()
    };

    let pipeline = Pipeline::new(
        db.clone(),
        fetch_client,
        Arc::new(DefaultCapabilities::new(api_client)),
        retry,
    );
    let scheduler = Scheduler::new(pipeline);

    // Start a timer for every stored feed. New feeds added while the
    // service runs are picked up via Scheduler::start_feed by whatever
    // surface inserts them.
    let feeds = db::list_feeds(db.pool()).await?;
    info!(count = feeds.len(), "Starting feed timers");
    for feed in &feeds {
        scheduler.start_feed(&feed.user_id, feed.id);
    }

    shutdown_signal().await;

    info!("Shutting down...");
    scheduler.stop_all().await;
    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rss_ai_publisher=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        // Structured JSON logging for production
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        // Pretty-printed logging for development
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
