pub mod api;
pub mod auth;


pub use api::{RedditApiClient, RedditPostData, RedditSubredditData, NEW_POSTS_LIMIT};
pub use auth::{Grant, RedditAuth, RedditCredentials};

use async_trait::async_trait;
use sidehustle_core::{CoreError, RedditPost, SubredditInfo};

/// Read access to public subreddit data.
#[async_trait]
pub trait SubredditSource: Send + Sync {
    /// Canonical name and subscriber count. Fails with `SubredditNotFound`
    /// when the community does not exist.
    async fn fetch_subreddit(&self, name: &str) -> Result<SubredditInfo, CoreError>;

    /// Up to [`NEW_POSTS_LIMIT`] newest posts, newest first.
    async fn fetch_new_posts(&self, name: &str) -> Result<Vec<RedditPost>, CoreError>;
}

#[async_trait]
impl SubredditSource for RedditApiClient {
    async fn fetch_subreddit(&self, name: &str) -> Result<SubredditInfo, CoreError> {
        Ok(self.get_subreddit_info(name).await?.into())
    }

    async fn fetch_new_posts(&self, name: &str) -> Result<Vec<RedditPost>, CoreError> {
        let listing = self.get_new_posts(name, NEW_POSTS_LIMIT).await?;
        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .collect())
    }
}
