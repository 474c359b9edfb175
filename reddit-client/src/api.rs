use crate::auth::{Grant, RedditAuth, RedditCredentials, REDDIT_TOKEN_URL};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use sidehustle_core::{CoreError, RedditApiError, RedditPost, SubredditInfo};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const PERMALINK_BASE: &str = "https://reddit.com";

/// Page size requested from the `new` listing; Reddit caps it at 100.
pub const NEW_POSTS_LIMIT: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditSubredditData {
    pub display_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subscribers: Option<i64>,
    #[serde(default)]
    pub public_description: String,
}

/// Thing wrapper returned by `/about`; anything but `t5` means the community
/// does not exist.
#[derive(Debug, Deserialize)]
struct RedditThing {
    kind: String,
    data: serde_json::Value,
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    auth: RedditAuth,
    base_url: String,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(credentials: RedditCredentials) -> Result<Self, CoreError> {
        Self::with_endpoints(credentials, REDDIT_API_BASE, REDDIT_TOKEN_URL)
    }

    /// Builds a client against alternative API and token endpoints.
    pub fn with_endpoints(
        credentials: RedditCredentials,
        base_url: &str,
        token_url: &str,
    ) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&credentials.user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        let auth = RedditAuth::new(&credentials, token_url, http_client.clone())?;
        info!(
            "Reddit client configured with {:?} grant",
            auth.grant()
        );

        Ok(Self {
            http_client,
            auth,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: credentials.user_agent,
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn grant(&self) -> &Grant {
        self.auth.grant()
    }

    async fn make_request(
        &self,
        subreddit: &str,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let access_token = self.auth.access_token().await?;

        info!("Making Reddit API request: GET {}", endpoint);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await
            .map_err(|e| {
                error!("Network error for GET {}: {}", endpoint, e);
                if e.is_timeout() {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            // Unknown communities on `new` are redirected to the search page.
            if response.url().path().starts_with("/subreddits/search") {
                return Err(not_found(subreddit));
            }
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after })
            }
            StatusCode::UNAUTHORIZED => {
                self.auth.invalidate().await;
                CoreError::RedditApi(RedditApiError::InvalidToken)
            }
            StatusCode::FORBIDDEN => CoreError::RedditApi(RedditApiError::Forbidden {
                resource: format!("r/{}", subreddit),
            }),
            StatusCode::NOT_FOUND => not_found(subreddit),
            s if s.is_server_error() => CoreError::RedditApi(RedditApiError::ServerError {
                status_code: s.as_u16(),
            }),
            s => CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Unexpected status {} for {}", s, endpoint),
            }),
        })
    }

    pub async fn get_subreddit_info(
        &self,
        subreddit: &str,
    ) -> Result<RedditSubredditData, CoreError> {
        let endpoint = format!("/r/{}/about", subreddit);
        let response = self.make_request(subreddit, &endpoint, &[]).await?;

        let thing: RedditThing = response.json().await.map_err(|e| {
            error!("Failed to parse subreddit info: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse info for r/{}", subreddit),
            })
        })?;

        let data = parse_subreddit_thing(subreddit, thing)?;
        debug!("Retrieved info for r/{}", subreddit);
        Ok(data)
    }

    pub async fn get_new_posts(
        &self,
        subreddit: &str,
        limit: u32,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/new", subreddit);
        let limit = limit.to_string();
        let response = self
            .make_request(subreddit, &endpoint, &[("limit", limit.as_str()), ("raw_json", "1")])
            .await?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!("Failed to parse subreddit posts: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse posts for r/{}", subreddit),
            })
        })?;

        info!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }
}

fn not_found(subreddit: &str) -> CoreError {
    CoreError::RedditApi(RedditApiError::SubredditNotFound {
        subreddit: subreddit.to_string(),
    })
}

fn parse_subreddit_thing(
    subreddit: &str,
    thing: RedditThing,
) -> Result<RedditSubredditData, CoreError> {
    if thing.kind != "t5" {
        return Err(not_found(subreddit));
    }
    serde_json::from_value(thing.data).map_err(|e| {
        CoreError::RedditApi(RedditApiError::InvalidResponse {
            details: format!("Malformed subreddit data for r/{}: {}", subreddit, e),
        })
    })
}

impl From<RedditSubredditData> for SubredditInfo {
    fn from(data: RedditSubredditData) -> Self {
        Self {
            name: data.display_name,
            subscribers: data.subscribers.unwrap_or(0),
        }
    }
}

impl From<RedditPostData> for RedditPost {
    fn from(post_data: RedditPostData) -> Self {
        let created_at = DateTime::<Utc>::from_timestamp(post_data.created_utc as i64, 0)
            .unwrap_or_default();

        Self {
            id: post_data.id,
            title: post_data.title,
            body: post_data.selftext,
            score: post_data.score,
            comment_count: post_data.num_comments,
            created_at,
            url: format!("{}{}", PERMALINK_BASE, post_data.permalink),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_data() -> RedditPostData {
        RedditPostData {
            id: "test123".to_string(),
            title: "Test Post".to_string(),
            selftext: "This is test content".to_string(),
            permalink: "/r/sidehustle/comments/test123/test_post/".to_string(),
            created_utc: 1640995200.0,
            score: 42,
            num_comments: 5,
        }
    }

    #[test]
    fn test_client_creation() {
        let credentials = RedditCredentials::new(
            "id".to_string(),
            "secret".to_string(),
            "sidehustle-test/1.0".to_string(),
        );
        let client = RedditApiClient::new(credentials).unwrap();
        assert_eq!(client.user_agent(), "sidehustle-test/1.0");
        assert_eq!(client.base_url, REDDIT_API_BASE);
    }

    #[test]
    fn test_reddit_post_conversion() {
        let post: RedditPost = post_data().into();
        assert_eq!(post.id, "test123");
        assert_eq!(post.body, "This is test content");
        assert_eq!(post.comment_count, 5);
        assert_eq!(post.created_at.timestamp(), 1640995200);
        assert_eq!(
            post.url,
            "https://reddit.com/r/sidehustle/comments/test123/test_post/"
        );
    }

    #[test]
    fn test_listing_deserialization_tolerates_missing_fields() {
        let json = r#"{
            "kind": "Listing",
            "data": {
                "after": null,
                "before": null,
                "children": [
                    {"kind": "t3", "data": {
                        "id": "abc",
                        "title": "Link post",
                        "permalink": "/r/sidehustle/comments/abc/link_post/",
                        "created_utc": 1700000000.0,
                        "score": 7
                    }}
                ]
            }
        }"#;

        let listing: RedditListing<RedditPostData> = serde_json::from_str(json).unwrap();
        let post: RedditPost = listing.data.children[0].data.clone().into();
        assert_eq!(post.body, "");
        assert_eq!(post.comment_count, 0);
        assert_eq!(post.score, 7);
    }

    #[test]
    fn test_subreddit_thing_parsing() {
        let about: RedditThing = serde_json::from_str(
            r#"{"kind": "t5", "data": {"display_name": "sidehustle", "subscribers": 150000}}"#,
        )
        .unwrap();
        let info: SubredditInfo = parse_subreddit_thing("sidehustle", about).unwrap().into();
        assert_eq!(info.subscribers, 150000);

        let listing: RedditThing = serde_json::from_str(
            r#"{"kind": "Listing", "data": {"children": []}}"#,
        )
        .unwrap();
        assert!(matches!(
            parse_subreddit_thing("nope", listing),
            Err(CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }))
        ));
    }
}
