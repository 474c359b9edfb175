use crate::LlmProvider;
use futures::future::join_all;
use sidehustle_core::{
    retry_transient, AnnotatedPost, CategorizedPost, CategoryFlags, RedditPost, RetryConfig,
    SentimentResult,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Classifies batches of posts concurrently. A post whose classification
/// still fails after retries gets the default result instead of failing the
/// batch.
#[derive(Clone)]
pub struct PostAnalyzer {
    provider: Arc<dyn LlmProvider>,
    retry: RetryConfig,
}

impl PostAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, retry: RetryConfig) -> Self {
        Self { provider, retry }
    }

    pub async fn sentiment_for(&self, post: &RedditPost) -> SentimentResult {
        let result = retry_transient(
            &self.retry,
            "classify_sentiment",
            || self.provider.classify_sentiment(&post.title, &post.body),
        )
        .await;

        match result {
            Ok(sentiment) => sentiment,
            Err(e) => {
                warn!(
                    "Sentiment classification failed for post {} ({}), using neutral: {}",
                    post.id,
                    self.provider.provider_name(),
                    e
                );
                SentimentResult::neutral()
            }
        }
    }

    pub async fn categories_for(&self, post: &RedditPost) -> CategoryFlags {
        let result = retry_transient(
            &self.retry,
            "classify_categories",
            || self.provider.classify_categories(&post.title, &post.body),
        )
        .await;

        match result {
            Ok(flags) => flags.with_fallback(),
            Err(e) => {
                warn!(
                    "Categorization failed for post {} ({}), using fallback: {}",
                    post.id,
                    self.provider.provider_name(),
                    e
                );
                CategoryFlags::fallback()
            }
        }
    }

    /// Attaches a sentiment to every post, preserving order.
    pub async fn annotate_sentiment(&self, posts: Vec<RedditPost>) -> Vec<AnnotatedPost> {
        debug!("Classifying sentiment for {} posts", posts.len());
        let sentiments = join_all(posts.iter().map(|post| self.sentiment_for(post))).await;

        posts
            .into_iter()
            .zip(sentiments)
            .map(|(post, sentiment)| AnnotatedPost {
                post,
                sentiment: Some(sentiment),
            })
            .collect()
    }

    /// Categorizes every post, preserving order.
    pub async fn categorize(&self, posts: Vec<RedditPost>) -> Vec<CategorizedPost> {
        debug!("Categorizing {} posts", posts.len());
        let categories = join_all(posts.iter().map(|post| self.categories_for(post))).await;

        posts
            .into_iter()
            .zip(categories)
            .map(|(post, categories)| CategorizedPost { post, categories })
            .collect()
    }
}
