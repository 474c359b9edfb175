use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// A subreddit tracked by one user, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSubreddit {
    pub id: String,
    pub name: String,
    pub subscriber_count: i64,
    pub post_count_24h: i64,
    pub last_updated: DateTime<Utc>,
    pub owner_user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Subreddit metadata as reported by the content platform.
#[derive(Debug, Clone, PartialEq)]
pub struct SubredditInfo {
    pub name: String,
    pub subscribers: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    #[serde(rename = "content")]
    pub body: String,
    pub score: i64,
    #[serde(rename = "numComments")]
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SentimentLabel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(CoreError::InvalidInput {
                message: format!("Unknown sentiment '{}'", other),
            }),
        }
    }
}

/// Sentiment selection for post filtering; `All` disables the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SentimentFilter {
    #[default]
    All,
    Only(SentimentLabel),
}

impl FromStr for SentimentFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(SentimentFilter::All);
        }
        trimmed.parse().map(SentimentFilter::Only)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub confidence: f64,
}

impl SentimentResult {
    /// Builds a result with the confidence clamped into `[0, 1]`.
    pub fn new(label: SentimentLabel, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { label, confidence }
    }

    /// Substitute used when classification fails.
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            confidence: 0.0,
        }
    }
}

/// Six independent topical flags for one post. Field names match the
/// classification tool schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFlags {
    pub side_hustle_opportunities: bool,
    pub freelance_opportunities: bool,
    pub passive_income_opportunities: bool,
    pub money_talk: bool,
    pub side_hustle_tips: bool,
    pub side_hustle_resources: bool,
}

impl CategoryFlags {
    /// Substitute used when classification fails: money talk only.
    pub fn fallback() -> Self {
        Self {
            money_talk: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !Category::ALL.iter().any(|category| self.contains(*category))
    }

    pub fn contains(&self, category: Category) -> bool {
        match category {
            Category::SideHustleOpportunities => self.side_hustle_opportunities,
            Category::FreelanceOpportunities => self.freelance_opportunities,
            Category::PassiveIncome => self.passive_income_opportunities,
            Category::MoneyTalk => self.money_talk,
            Category::SideHustleTips => self.side_hustle_tips,
            Category::Resources => self.side_hustle_resources,
        }
    }

    /// Forces money talk when no flag is set so every post lands in a theme.
    ///
    /// This default is kept from the product as shipped; it is questionable
    /// whether an unclassifiable post should count as money talk.
    pub fn with_fallback(mut self) -> Self {
        if self.is_empty() {
            self.money_talk = true;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    SideHustleOpportunities,
    FreelanceOpportunities,
    PassiveIncome,
    MoneyTalk,
    SideHustleTips,
    Resources,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::SideHustleOpportunities,
        Category::FreelanceOpportunities,
        Category::PassiveIncome,
        Category::MoneyTalk,
        Category::SideHustleTips,
        Category::Resources,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Category::SideHustleOpportunities => "Side Hustle Opportunities",
            Category::FreelanceOpportunities => "Freelance Opportunities",
            Category::PassiveIncome => "Passive Income",
            Category::MoneyTalk => "Money Talk",
            Category::SideHustleTips => "Side Hustle Tips",
            Category::Resources => "Resources",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Category::SideHustleOpportunities => "Posts about potential side hustle opportunities",
            Category::FreelanceOpportunities => "Posts about freelancing opportunities",
            Category::PassiveIncome => "Posts about passive income streams",
            Category::MoneyTalk => "Discussions about money and finances",
            Category::SideHustleTips => "Tips and advice for side hustles",
            Category::Resources => "Useful resources and tools",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedPost {
    #[serde(flatten)]
    pub post: RedditPost,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentResult>,
}

impl From<RedditPost> for AnnotatedPost {
    fn from(post: RedditPost) -> Self {
        Self {
            post,
            sentiment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedPost {
    pub post: RedditPost,
    pub categories: CategoryFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemePost {
    pub title: String,
    pub url: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Theme {
    pub name: String,
    pub description: String,
    pub count: usize,
    pub posts: Vec<ThemePost>,
}

/// Outcome of refreshing a batch of tracked subreddits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RefreshSummary {
    pub updated: usize,
    pub total: usize,
}

impl RefreshSummary {
    pub fn message(&self) -> String {
        format!(
            "Updated stats for {} out of {} subreddits",
            self.updated, self.total
        )
    }
}
