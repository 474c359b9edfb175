use database::Database;
use futures::future::join_all;
use reddit_client::SubredditSource;
use sidehustle_core::{
    analysis, retry_transient, CoreError, RefreshSummary, RetryConfig, TrackedSubreddit,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Re-fetches subscriber and 24h post counts for tracked subreddits.
#[derive(Clone)]
pub struct StatsRefresher {
    source: Arc<dyn SubredditSource>,
    db: Database,
    retry: RetryConfig,
}

impl StatsRefresher {
    pub fn new(source: Arc<dyn SubredditSource>, db: Database, retry: RetryConfig) -> Self {
        Self { source, db, retry }
    }

    /// Refreshes one row. Returns `false` when the row vanished meanwhile.
    pub async fn refresh_one(&self, subreddit: &TrackedSubreddit) -> Result<bool, CoreError> {
        let name = subreddit.name.as_str();
        let info = retry_transient(
            &self.retry,
            "fetch_subreddit",
            || self.source.fetch_subreddit(name),
        )
        .await?;
        let posts = retry_transient(
            &self.retry,
            "fetch_new_posts",
            || self.source.fetch_new_posts(name),
        )
        .await?;

        let recent = analysis::count_recent(chrono::Utc::now(), &posts) as i64;
        debug!(
            "r/{}: {} subscribers, {} posts in 24h",
            name, info.subscribers, recent
        );

        self.db
            .update_stats(
                &subreddit.id,
                &subreddit.owner_user_id,
                info.subscribers,
                recent,
            )
            .await
    }

    /// Refreshes every subreddit `owner_user_id` tracks.
    pub async fn refresh_owner(&self, owner_user_id: &str) -> Result<RefreshSummary, CoreError> {
        let subreddits = self.db.list_subreddits(owner_user_id).await?;
        Ok(self.refresh_rows(&subreddits).await)
    }

    /// Refreshes every tracked row across all owners.
    pub async fn refresh_all(&self) -> Result<RefreshSummary, CoreError> {
        let subreddits = self.db.list_all_subreddits().await?;
        Ok(self.refresh_rows(&subreddits).await)
    }

    async fn refresh_rows(&self, subreddits: &[TrackedSubreddit]) -> RefreshSummary {
        let results = join_all(subreddits.iter().map(|s| self.refresh_one(s))).await;

        let mut updated = 0;
        for (subreddit, result) in subreddits.iter().zip(results) {
            match result {
                Ok(true) => updated += 1,
                Ok(false) => debug!("r/{} was removed during refresh", subreddit.name),
                Err(e) => {
                    warn!("Error updating stats for r/{}: {}", subreddit.name, e);
                }
            }
        }

        let summary = RefreshSummary {
            updated,
            total: subreddits.len(),
        };
        info!("{}", summary.message());
        summary
    }
}

/// Periodic refresh loop running on its own task.
pub struct BackgroundService {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl BackgroundService {
    /// Spawns the loop. The first refresh happens one `interval` after start.
    pub fn start(refresher: StatsRefresher, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Background refresh every {:?}", interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = refresher.refresh_all().await {
                            error!("Background refresh failed: {}", e);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Background refresh stopped");
        });

        Self { handle, shutdown }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signals the loop and waits for it to exit.
    pub async fn stop(self) {
        // Only fails when the task already exited.
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!("Background refresh task panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests;
