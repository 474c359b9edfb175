use sidehustle_core::{
    ConfigError, CoreError, DatabaseError, ErrorExt, LlmError, RedditApiError,
};
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let db_error = CoreError::Database(DatabaseError::DatabaseLocked);
    assert_eq!(db_error.error_code(), "DATABASE");

    let llm_error = CoreError::Llm(LlmError::InvalidApiKey {
        provider: "openai".to_string(),
    });
    assert_eq!(llm_error.error_code(), "LLM");

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert_eq!(config_error.error_code(), "CONFIG");
}

#[test]
fn test_retryable_errors() {
    let retryable_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let server_error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 503 });
    assert!(server_error.is_retryable());

    let llm_unavailable = CoreError::Llm(LlmError::ServiceUnavailable {
        provider: "openai".to_string(),
    });
    assert!(llm_unavailable.is_retryable());

    // A rejected token is dropped from the cache, so retrying re-authenticates.
    let invalid_token = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert!(invalid_token.is_retryable());

    let not_found = CoreError::RedditApi(RedditApiError::SubredditNotFound {
        subreddit: "doesnotexist".to_string(),
    });
    assert!(!not_found.is_retryable());

    let non_retryable_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(
        rate_limit_error.retry_after(),
        Some(Duration::from_secs(60))
    );

    let llm_rate_limit = CoreError::Llm(LlmError::RateLimitExceeded {
        provider: "openai".to_string(),
        retry_after: 20,
    });
    assert_eq!(llm_rate_limit.retry_after(), Some(Duration::from_secs(20)));

    let invalid = CoreError::InvalidInput {
        message: "bad".to_string(),
    };
    assert_eq!(invalid.retry_after(), None);
}

#[test]
fn test_user_friendly_messages() {
    let not_found = CoreError::RedditApi(RedditApiError::SubredditNotFound {
        subreddit: "doesnotexist".to_string(),
    });
    let message = not_found.user_friendly_message();
    assert!(message.contains("doesnotexist"));

    let duplicate = CoreError::Database(DatabaseError::ConstraintViolation {
        constraint: "subreddits.name, subreddits.owner_user_id".to_string(),
    });
    assert_eq!(
        duplicate.user_friendly_message(),
        "You are already tracking this subreddit"
    );

    let config_error = CoreError::Config(ConfigError::MissingField {
        field: "api_key".to_string(),
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("api_key"));
}

#[test]
fn test_log_error_returns_self() {
    let error = CoreError::RedditApi(RedditApiError::InvalidToken);
    // Only checks that logging does not panic without a subscriber.
    assert_eq!(error.log_error().error_code(), "REDDIT_API");
}
