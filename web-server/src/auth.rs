use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Id of the signed-in user, taken from the header the identity proxy sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let user_id = parts
            .headers
            .get(&state.user_header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match user_id {
            Some(user_id) => Ok(AuthUser(user_id.to_string())),
            None => {
                debug!("Rejecting request without {} header", state.user_header);
                Err(ApiError::Unauthorized)
            }
        }
    }
}
