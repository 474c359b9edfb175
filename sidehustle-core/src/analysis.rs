//! Pure filtering, ranking and aggregation over fetched posts.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::cmp::Reverse;

use crate::types::{
    AnnotatedPost, CategorizedPost, Category, RedditPost, SentimentFilter, Theme, ThemePost,
};

/// Posts older than this are excluded from counts and analysis.
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// Upper bound on posts sent for classification in one request.
pub const MAX_ANALYZED_POSTS: usize = 25;

pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const MAX_PAGE_SIZE: usize = 100;

pub fn recent_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(RECENT_WINDOW_HOURS)
}

/// Keeps posts created strictly after `now - 24h`.
pub fn filter_recent(now: DateTime<Utc>, posts: Vec<RedditPost>) -> Vec<RedditPost> {
    let cutoff = recent_cutoff(now);
    posts
        .into_iter()
        .filter(|post| post.created_at > cutoff)
        .collect()
}

pub fn count_recent(now: DateTime<Utc>, posts: &[RedditPost]) -> usize {
    let cutoff = recent_cutoff(now);
    posts.iter().filter(|post| post.created_at > cutoff).count()
}

/// Case-insensitive substring match. An empty keyword matches everything.
pub fn matches_keyword(keyword: &str, text: &str) -> bool {
    let needle = keyword.trim().to_lowercase();
    needle.is_empty() || text.to_lowercase().contains(&needle)
}

pub fn post_matches_keyword(post: &RedditPost, keyword: &str) -> bool {
    matches_keyword(keyword, &post.title) || matches_keyword(keyword, &post.body)
}

pub fn matches_sentiment(post: &AnnotatedPost, filter: SentimentFilter) -> bool {
    match filter {
        SentimentFilter::All => true,
        SentimentFilter::Only(label) => post
            .sentiment
            .map(|sentiment| sentiment.label == label)
            .unwrap_or(false),
    }
}

/// Keeps posts matching both the keyword and the sentiment predicate,
/// preserving input order.
pub fn filter_posts(
    posts: Vec<AnnotatedPost>,
    keyword: Option<&str>,
    sentiment: SentimentFilter,
) -> Vec<AnnotatedPost> {
    posts
        .into_iter()
        .filter(|post| keyword.map_or(true, |k| post_matches_keyword(&post.post, k)))
        .filter(|post| matches_sentiment(post, sentiment))
        .collect()
}

/// Stable sort by score, highest first.
pub fn rank_by_score(posts: &mut [RedditPost]) {
    posts.sort_by_key(|post| Reverse(post.score));
}

/// Groups posts into the six fixed themes. The money-talk fallback is applied
/// first, so no post ends up outside every theme.
pub fn bucket_by_category(posts: &[CategorizedPost]) -> Vec<Theme> {
    let posts: Vec<(&RedditPost, _)> = posts
        .iter()
        .map(|entry| (&entry.post, entry.categories.with_fallback()))
        .collect();

    Category::ALL
        .iter()
        .map(|category| {
            let members: Vec<ThemePost> = posts
                .iter()
                .filter(|(_, flags)| flags.contains(*category))
                .map(|(post, _)| ThemePost {
                    title: post.title.clone(),
                    url: post.url.clone(),
                    score: post.score,
                })
                .collect();

            Theme {
                name: category.name().to_string(),
                description: category.description().to_string(),
                count: members.len(),
                posts: members,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub posts: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

/// Slices `items` into a 1-based page. A zero page is read as the first page
/// and the page size is clamped to `1..=MAX_PAGE_SIZE`.
pub fn paginate<T>(items: Vec<T>, page: Option<usize>, page_size: Option<usize>) -> Page<T> {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let total = items.len();
    let start = (page - 1).saturating_mul(page_size);

    let posts = items.into_iter().skip(start).take(page_size).collect();

    Page {
        posts,
        page,
        page_size,
        total,
    }
}
