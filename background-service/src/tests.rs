use crate::{BackgroundService, StatsRefresher};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use database::{Database, NewSubreddit};
use reddit_client::SubredditSource;
use sidehustle_core::{CoreError, RedditApiError, RedditPost, RetryConfig, SubredditInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Knows `sidehustle` and `beermoney`; everything else is missing.
#[derive(Default)]
struct FakeSource {
    about_calls: AtomicUsize,
}

#[async_trait]
impl SubredditSource for FakeSource {
    async fn fetch_subreddit(&self, name: &str) -> Result<SubredditInfo, CoreError> {
        self.about_calls.fetch_add(1, Ordering::SeqCst);
        let subscribers = match name {
            "sidehustle" => 150_000,
            "beermoney" => 80_000,
            _ => {
                return Err(CoreError::RedditApi(RedditApiError::SubredditNotFound {
                    subreddit: name.to_string(),
                }))
            }
        };
        Ok(SubredditInfo {
            name: name.to_string(),
            subscribers,
        })
    }

    async fn fetch_new_posts(&self, name: &str) -> Result<Vec<RedditPost>, CoreError> {
        let now = Utc::now();
        Ok([1, 5, 30]
            .iter()
            .map(|hours| RedditPost {
                id: format!("{}-{}", name, hours),
                title: "post".to_string(),
                body: String::new(),
                score: 1,
                comment_count: 0,
                created_at: now - ChronoDuration::hours(*hours),
                url: String::new(),
            })
            .collect())
    }
}

async fn setup() -> (Arc<FakeSource>, Database, StatsRefresher) {
    let db = Database::in_memory().await.unwrap();
    db.run_migrations().await.unwrap();
    let source = Arc::new(FakeSource::default());
    let refresher = StatsRefresher::new(
        source.clone(),
        db.clone(),
        RetryConfig::new(3, Duration::from_millis(1)),
    );
    (source, db, refresher)
}

async fn track(db: &Database, name: &str, owner: &str) {
    db.insert_subreddit(NewSubreddit {
        name,
        owner_user_id: owner,
        subscriber_count: 0,
        post_count_24h: 0,
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_refresh_owner_updates_stats() {
    let (_, db, refresher) = setup().await;
    track(&db, "sidehustle", "user-1").await;
    track(&db, "beermoney", "user-2").await;

    let summary = refresher.refresh_owner("user-1").await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.total, 1);
    assert_eq!(summary.message(), "Updated stats for 1 out of 1 subreddits");

    let row = db.find_subreddit("user-1", "sidehustle").await.unwrap().unwrap();
    assert_eq!(row.subscriber_count, 150_000);
    assert_eq!(row.post_count_24h, 2);

    // Other owners are untouched.
    let other = db.find_subreddit("user-2", "beermoney").await.unwrap().unwrap();
    assert_eq!(other.subscriber_count, 0);
}

#[tokio::test]
async fn test_partial_failure_is_counted_not_fatal() {
    let (source, db, refresher) = setup().await;
    track(&db, "sidehustle", "user-1").await;
    track(&db, "vanished", "user-1").await;

    let summary = refresher.refresh_owner("user-1").await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.total, 2);

    // Not-found is not retried.
    assert_eq!(source.about_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_refresh_with_nothing_tracked() {
    let (_, _, refresher) = setup().await;
    let summary = refresher.refresh_owner("nobody").await.unwrap();
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.total, 0);
}

#[tokio::test]
async fn test_refresh_all_covers_every_owner() {
    let (_, db, refresher) = setup().await;
    track(&db, "sidehustle", "user-1").await;
    track(&db, "beermoney", "user-2").await;

    let summary = refresher.refresh_all().await.unwrap();
    assert_eq!(summary.updated, 2);
    assert_eq!(summary.total, 2);
}

#[tokio::test]
async fn test_background_loop_runs_and_stops() {
    let (source, db, refresher) = setup().await;
    track(&db, "sidehustle", "user-1").await;

    let service = BackgroundService::start(refresher, Duration::from_millis(20));
    assert!(service.is_running());

    tokio::time::sleep(Duration::from_millis(120)).await;
    service.stop().await;

    assert!(source.about_calls.load(Ordering::SeqCst) >= 1);
    let row = db.find_subreddit("user-1", "sidehustle").await.unwrap().unwrap();
    assert_eq!(row.subscriber_count, 150_000);
}
