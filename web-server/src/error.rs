use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sidehustle_core::{CoreError, DatabaseError, ErrorExt, RedditApiError};
use thiserror::Error;
use tracing::error;

pub const ALREADY_TRACKING: &str = "You are already tracking this subreddit";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Logged in full; clients only see `context`.
    #[error("{context}: {source}")]
    Internal {
        context: &'static str,
        #[source]
        source: CoreError,
    },
}

impl ApiError {
    /// Classifies a domain error. Anything that is not the caller's fault
    /// becomes a 500 carrying `context` as its public message.
    pub fn from_core(context: &'static str, err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput { .. } => ApiError::BadRequest(err.user_friendly_message()),
            CoreError::Database(DatabaseError::ConstraintViolation { .. }) => {
                ApiError::BadRequest(ALREADY_TRACKING.to_string())
            }
            CoreError::RedditApi(
                ref e @ (RedditApiError::SubredditNotFound { .. } | RedditApiError::Forbidden { .. }),
            ) => ApiError::NotFound(e.user_friendly_message()),
            source => ApiError::Internal { context, source },
        }
    }

    /// Adapter for `map_err`.
    pub fn context(context: &'static str) -> impl FnOnce(CoreError) -> Self {
        move |err| Self::from_core(context, err)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::from_core("Internal server error", err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal { context, source } => {
                error!(code = %source.error_code(), "{}", context);
                source.log_error();
                context.to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                CoreError::InvalidInput {
                    message: "bad name".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                CoreError::Database(DatabaseError::ConstraintViolation {
                    constraint: "unique".to_string(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                CoreError::RedditApi(RedditApiError::SubredditNotFound {
                    subreddit: "nope".to_string(),
                }),
                StatusCode::NOT_FOUND,
            ),
            (
                CoreError::RedditApi(RedditApiError::ServerError { status_code: 502 }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                CoreError::Database(DatabaseError::DatabaseLocked),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from_core("Failed", err).status(), status);
        }
    }

    #[test]
    fn test_duplicate_message() {
        let err = ApiError::from_core(
            "Failed",
            CoreError::Database(DatabaseError::ConstraintViolation {
                constraint: "UNIQUE".to_string(),
            }),
        );
        assert_eq!(err.to_string(), ALREADY_TRACKING);
    }

    #[test]
    fn test_invalid_input_keeps_message() {
        let err = ApiError::from_core(
            "Failed",
            CoreError::InvalidInput {
                message: "Invalid subreddit name".to_string(),
            },
        );
        assert_eq!(err.to_string(), "Invalid subreddit name");
    }

    #[test]
    fn test_internal_hides_details() {
        let err = ApiError::context("Failed to fetch posts")(CoreError::Database(
            DatabaseError::MigrationFailed {
                migration: "secret detail".to_string(),
            },
        ));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
