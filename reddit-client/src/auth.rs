use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, RequestTokenError,
    ResourceOwnerPassword, ResourceOwnerUsername, TokenResponse, TokenUrl,
};
use reqwest::Client;
use sidehustle_core::config::RedditConfig;
use sidehustle_core::{ConfigError, CoreError, RedditApiError};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

pub const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are refreshed this long before Reddit would expire them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
}

impl RedditCredentials {
    pub fn new(client_id: String, client_secret: String, user_agent: String) -> Self {
        Self {
            client_id,
            client_secret,
            username: None,
            password: None,
            user_agent,
        }
    }

    /// Builds credentials from validated configuration.
    pub fn from_config(config: &RedditConfig) -> Result<Self, CoreError> {
        let client_id = config.client_id.clone().ok_or_else(|| ConfigError::MissingField {
            field: "reddit.client_id".to_string(),
        })?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or_else(|| ConfigError::MissingField {
                field: "reddit.client_secret".to_string(),
            })?;

        Ok(Self {
            client_id,
            client_secret,
            username: config.username.clone(),
            password: config.password.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn with_account(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    pub fn grant(&self) -> Grant {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Grant::Password {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Grant::ClientCredentials,
        }
    }
}

impl fmt::Debug for RedditCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedditCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

/// OAuth2 grant used to obtain application tokens.
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    /// Script app acting as a Reddit account.
    Password { username: String, password: String },
    /// Application-only, read-only access.
    ClientCredentials,
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::Password { username, .. } => {
                f.debug_struct("Password").field("username", username).finish_non_exhaustive()
            }
            Grant::ClientCredentials => f.write_str("ClientCredentials"),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// Fetches and caches application access tokens.
#[derive(Debug)]
pub struct RedditAuth {
    oauth_client: BasicClient,
    grant: Grant,
    http_client: Client,
    token: RwLock<Option<CachedToken>>,
}

impl RedditAuth {
    pub fn new(
        credentials: &RedditCredentials,
        token_url: &str,
        http_client: Client,
    ) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(invalid_url)?;
        let token_url = TokenUrl::new(token_url.to_string()).map_err(invalid_url)?;

        let oauth_client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        );

        Ok(Self {
            oauth_client,
            grant: credentials.grant(),
            http_client,
            token: RwLock::new(None),
        })
    }

    pub fn grant(&self) -> &Grant {
        &self.grant
    }

    /// Returns a cached token, requesting a new one when it is missing or
    /// about to expire.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let response = self.request_token().await?;
        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let token = CachedToken {
            access_token: response.access_token().secret().clone(),
            expires_at: Instant::now() + lifetime,
        };
        info!("Obtained Reddit access token valid for {:?}", lifetime);

        let access_token = token.access_token.clone();
        *slot = Some(token);
        Ok(access_token)
    }

    /// Drops the cached token so the next request re-authenticates.
    pub async fn invalidate(&self) {
        debug!("Invalidating cached Reddit access token");
        *self.token.write().await = None;
    }

    async fn request_token(&self) -> Result<BasicTokenResponse, CoreError> {
        let http_client = &self.http_client;
        let result = match &self.grant {
            Grant::Password { username, password } => {
                let username = ResourceOwnerUsername::new(username.clone());
                let password = ResourceOwnerPassword::new(password.clone());
                self.oauth_client
                    .exchange_password(&username, &password)
                    .request_async(|request| send_token_request(http_client, request))
                    .await
            }
            Grant::ClientCredentials => {
                self.oauth_client
                    .exchange_client_credentials()
                    .request_async(|request| send_token_request(http_client, request))
                    .await
            }
        };

        result.map_err(|e| {
            error!("Reddit token request failed: {}", e);
            match e {
                RequestTokenError::ServerResponse(response) => {
                    CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                        reason: response.to_string(),
                    })
                }
                RequestTokenError::Request(e) if e.is_timeout() => {
                    CoreError::RedditApi(RedditApiError::RequestTimeout)
                }
                RequestTokenError::Request(e) => CoreError::Network(e),
                other => CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: other.to_string(),
                }),
            }
        })
    }
}

/// Sends token requests through the shared client so they carry the
/// configured User-Agent, which Reddit requires.
async fn send_token_request(
    client: &Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;

    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

fn invalid_url(e: oauth2::url::ParseError) -> CoreError {
    CoreError::RedditApi(RedditApiError::AuthenticationFailed {
        reason: format!("Invalid OAuth URL: {}", e),
    })
}
