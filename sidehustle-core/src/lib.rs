pub mod analysis;
pub mod config;
pub mod error;
pub mod error_utils;
pub mod retry;
pub mod subreddit_name;
pub mod types;

pub use config::AppConfig;
pub use error::*;
pub use error_utils::*;
pub use retry::{
    calculate_delay, retry_transient, retry_when, retry_with_backoff, RetryConfig,
};
pub use subreddit_name::normalize_subreddit_name;
pub use types::*;
