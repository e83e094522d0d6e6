mod error;
mod handlers;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use codered_common::config::Config;
use codered_judge::{engine, Judge, JudgeSettings, RedisStore, SubmissionStore};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub judge: Judge,
    pub submissions: Arc<dyn SubmissionStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(config.log_json);

    info!("CodeRed API booting...");

    metrics::init_metrics().context("Failed to register metrics")?;

    // Connect to Redis
    let client = redis::Client::open(config.redis_url.as_str())
        .context("Failed to create Redis client")?;
    let redis_conn = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;

    info!("Connected to Redis: {}", config.redis_url);

    let store = Arc::new(RedisStore::new(redis_conn));
    let engine = engine::from_config(&config).context("Failed to build execution engine")?;
    info!(
        engine = engine.name(),
        max_concurrency = config.max_concurrent_executions,
        deadline_secs = config.submission_deadline_secs,
        "Execution engine ready"
    );

    let judge = Judge::new(
        engine,
        store.clone(),
        store.clone(),
        JudgeSettings::from_config(&config),
    );

    let state = Arc::new(AppState {
        judge,
        submissions: store,
    });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}
