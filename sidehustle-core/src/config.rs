//! Application configuration: an optional TOML file overlaid with environment
//! variables.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::{ConfigError, RetryConfig};

pub const DEFAULT_CONFIG_PATH: &str = "sidehustle.toml";
pub const CONFIG_PATH_ENV: &str = "SIDEHUSTLE_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            user_agent: "sidehustle".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sidehustle.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Header set by the fronting identity proxy with the signed-in user id.
    pub user_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            user_header: "x-user-id".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Zero disables the background refresh loop.
    pub interval_minutes: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

/// One week.
pub const MAX_REFRESH_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

impl RefreshConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_minutes > 0)
            .then(|| Duration::from_secs(self.interval_minutes.saturating_mul(60)))
    }

    /// Retry policy for upstream calls.
    pub fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }
}

impl AppConfig {
    /// Loads the file named by `SIDEHUSTLE_CONFIG` (or `sidehustle.toml` when it
    /// exists), applies environment overrides and validates the result.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let mut config = match explicit.as_deref() {
            Some(path) => Self::from_file(Path::new(path))?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        info!("Loading configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlays values from `lookup`, which maps an environment variable name
    /// to its value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = Some(value);
            }
        };
        set(&mut self.reddit.client_id, "REDDIT_CLIENT_ID");
        set(&mut self.reddit.client_secret, "REDDIT_CLIENT_SECRET");
        set(&mut self.reddit.username, "REDDIT_USERNAME");
        set(&mut self.reddit.password, "REDDIT_PASSWORD");
        set(&mut self.llm.api_key, "OPENAI_API_KEY");

        if let Some(user_agent) = lookup("REDDIT_USER_AGENT") {
            self.reddit.user_agent = user_agent;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(address) = lookup("BIND_ADDRESS") {
            self.server.bind_address = address;
        }
        if let Some(header) = lookup("AUTH_USER_HEADER") {
            self.server.user_header = header;
        }
        if let Some(minutes) = lookup("REFRESH_INTERVAL_MINUTES") {
            self.refresh.interval_minutes =
                minutes
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        field: "REFRESH_INTERVAL_MINUTES".to_string(),
                        value: minutes.clone(),
                    })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.reddit.client_id, "reddit.client_id")?;
        require(&self.reddit.client_secret, "reddit.client_secret")?;
        require(&self.llm.api_key, "llm.api_key")?;

        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "reddit.user_agent".to_string(),
                value: self.reddit.user_agent.clone(),
            });
        }
        if self.reddit.username.is_some() != self.reddit.password.is_some() {
            return Err(ConfigError::ValidationFailed {
                reason: "reddit.username and reddit.password must be set together".to_string(),
            });
        }
        if self.server.user_header.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "server.user_header".to_string(),
            });
        }
        if self.refresh.interval_minutes > MAX_REFRESH_INTERVAL_MINUTES {
            return Err(ConfigError::InvalidValue {
                field: "refresh.interval_minutes".to_string(),
                value: self.refresh.interval_minutes.to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.max_connections".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn require(value: &Option<String>, field: &str) -> Result<(), ConfigError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ConfigError::MissingField {
            field: field.to_string(),
        }),
    }
}
