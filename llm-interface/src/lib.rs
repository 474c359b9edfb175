pub mod analyzer;
pub mod openai;

pub use analyzer::PostAnalyzer;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use sidehustle_core::{CategoryFlags, CoreError, SentimentResult};

/// Classifies a single post. Implementations are side-effect free, so callers
/// may retry freely.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn classify_sentiment(&self, title: &str, body: &str)
        -> Result<SentimentResult, CoreError>;

    async fn classify_categories(&self, title: &str, body: &str)
        -> Result<CategoryFlags, CoreError>;
}
