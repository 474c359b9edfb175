use anyhow::Context;
use background_service::{BackgroundService, StatsRefresher};
use database::Database;
use llm_interface::OpenAiProvider;
use reddit_client::{RedditApiClient, RedditCredentials};
use sidehustle_core::AppConfig;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use web_server::{router, serve_with_background, shutdown_signal, AppState};

const DEFAULT_LOG_FILTER: &str = "sidehustle=info,web_server=info,reddit_client=info,\
llm_interface=info,database=info,background_service=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Sidehustle - subreddit tracker");

    let config = AppConfig::load().context("Failed to load configuration")?;
    let retry = config.refresh.retry();

    let credentials = RedditCredentials::from_config(&config.reddit)?;
    let reddit = Arc::new(RedditApiClient::new(credentials)?);
    let llm = Arc::new(OpenAiProvider::from_config(&config.llm)?);

    let db = Database::connect(&config.database.url, config.database.max_connections).await?;
    db.run_migrations().await?;

    let refresher = StatsRefresher::new(reddit.clone(), db.clone(), retry.clone());
    let state = AppState::new(db, reddit, llm, retry, &config.server.user_header)?;

    let listener = TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;

    // Last, after every fallible setup step.
    let background = config
        .refresh
        .interval()
        .map(|interval| BackgroundService::start(refresher, interval));
    if background.is_none() {
        tracing::info!("Background refresh disabled");
    }

    serve_with_background(listener, router(state), shutdown_signal(), background)
        .await
        .context("HTTP server failed")
}
