use axum::http::HeaderName;
use background_service::StatsRefresher;
use database::Database;
use llm_interface::{LlmProvider, PostAnalyzer};
use reddit_client::SubredditSource;
use sidehustle_core::{ConfigError, CoreError, RetryConfig};
use std::sync::Arc;

/// Collaborators shared by every handler. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub reddit: Arc<dyn SubredditSource>,
    pub analyzer: PostAnalyzer,
    pub refresher: StatsRefresher,
    pub retry: RetryConfig,
    pub user_header: HeaderName,
}

impl AppState {
    pub fn new(
        db: Database,
        reddit: Arc<dyn SubredditSource>,
        llm: Arc<dyn LlmProvider>,
        retry: RetryConfig,
        user_header: &str,
    ) -> Result<Self, CoreError> {
        let user_header = HeaderName::from_bytes(user_header.trim().as_bytes()).map_err(|_| {
            ConfigError::InvalidValue {
                field: "server.user_header".to_string(),
                value: user_header.to_string(),
            }
        })?;

        Ok(Self {
            analyzer: PostAnalyzer::new(llm, retry.clone()),
            refresher: StatsRefresher::new(reddit.clone(), db.clone(), retry.clone()),
            db,
            reddit,
            retry,
            user_header,
        })
    }
}
