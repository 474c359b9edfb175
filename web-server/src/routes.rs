use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use database::NewSubreddit;
use serde::Deserialize;
use serde_json::{json, Value};
use sidehustle_core::{
    analysis::{self, Page, MAX_ANALYZED_POSTS},
    normalize_subreddit_name, retry_transient, AnnotatedPost, CoreError, RedditPost,
    SentimentFilter, Theme, TrackedSubreddit,
};
use tracing::{debug, info, warn};

use crate::{
    auth::AuthUser,
    error::{ApiError, ALREADY_TRACKING},
    state::AppState,
};

const NAME_REQUIRED: &str = "Subreddit name is required";
const INVALID_QUERY: &str = "Invalid query parameters";

#[derive(Debug, Deserialize)]
pub struct CreateSubreddit {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostsQuery {
    pub keyword: Option<String>,
    pub sentiment: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_subreddits_handler(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<TrackedSubreddit>>, ApiError> {
    let subreddits = state
        .db
        .list_subreddits(&user_id)
        .await
        .map_err(ApiError::context("Failed to fetch subreddits"))?;
    Ok(Json(subreddits))
}

pub async fn create_subreddit_handler(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CreateSubreddit>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    const CONTEXT: &str = "Failed to create subreddit";
    let Json(payload) = payload.map_err(|rejection| {
        debug!("Rejected create body: {}", rejection);
        ApiError::BadRequest(NAME_REQUIRED.to_string())
    })?;
    let name = normalize_subreddit_name(&payload.name).map_err(ApiError::context(CONTEXT))?;

    if state
        .db
        .find_subreddit(&user_id, &name)
        .await
        .map_err(ApiError::context(CONTEXT))?
        .is_some()
    {
        return Err(ApiError::BadRequest(ALREADY_TRACKING.to_string()));
    }

    let info = retry_transient(
        &state.retry,
        "fetch_subreddit",
        || state.reddit.fetch_subreddit(&name),
    )
    .await
    .map_err(ApiError::context(CONTEXT))?;

    let post_count_24h = match state.reddit.fetch_new_posts(&name).await {
        Ok(posts) => analysis::count_recent(Utc::now(), &posts) as i64,
        Err(e) => {
            warn!("Could not count recent posts for r/{}: {}", name, e);
            0
        }
    };

    let tracked = state
        .db
        .insert_subreddit(NewSubreddit {
            name: &name,
            owner_user_id: &user_id,
            subscriber_count: info.subscribers,
            post_count_24h,
        })
        .await
        .map_err(ApiError::context(CONTEXT))?;

    info!("User {} now tracks r/{}", user_id, tracked.name);
    Ok((StatusCode::CREATED, Json(tracked)))
}

pub async fn delete_subreddit_handler(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    const CONTEXT: &str = "Failed to delete subreddit";
    let name = normalize_subreddit_name(&name).map_err(ApiError::context(CONTEXT))?;

    let deleted = state
        .db
        .delete_subreddit(&user_id, &name)
        .await
        .map_err(ApiError::context(CONTEXT))?;

    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

/// Newest posts of `name` from the last 24 hours, in listing order.
async fn recent_posts(state: &AppState, name: &str) -> Result<Vec<RedditPost>, CoreError> {
    let posts = retry_transient(
        &state.retry,
        "fetch_new_posts",
        || state.reddit.fetch_new_posts(name),
    )
    .await?;
    Ok(analysis::filter_recent(Utc::now(), posts))
}

pub async fn posts_handler(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(slug): Path<String>,
    query: Result<Query<PostsQuery>, QueryRejection>,
) -> Result<Json<Page<AnnotatedPost>>, ApiError> {
    const CONTEXT: &str = "Failed to fetch posts";
    let Query(query) = query.map_err(|rejection| {
        debug!("Rejected posts query: {}", rejection);
        ApiError::BadRequest(INVALID_QUERY.to_string())
    })?;
    let name = normalize_subreddit_name(&slug).map_err(ApiError::context(CONTEXT))?;
    let sentiment: SentimentFilter = query
        .sentiment
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(ApiError::context(CONTEXT))?;

    let mut posts = recent_posts(&state, &name)
        .await
        .map_err(ApiError::context(CONTEXT))?;
    analysis::rank_by_score(&mut posts);

    // Keyword first so only surviving posts are sent for classification.
    if let Some(keyword) = query.keyword.as_deref() {
        posts.retain(|post| analysis::post_matches_keyword(post, keyword));
    }

    let annotated = match sentiment {
        SentimentFilter::All => posts.into_iter().map(AnnotatedPost::from).collect(),
        SentimentFilter::Only(_) => {
            posts.truncate(MAX_ANALYZED_POSTS);
            state.analyzer.annotate_sentiment(posts).await
        }
    };
    let filtered = analysis::filter_posts(annotated, None, sentiment);

    Ok(Json(analysis::paginate(
        filtered,
        query.page,
        query.page_size,
    )))
}

pub async fn themes_handler(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<Vec<Theme>>, ApiError> {
    const CONTEXT: &str = "Failed to analyze themes";
    let name = normalize_subreddit_name(&slug).map_err(ApiError::context(CONTEXT))?;

    let mut posts = recent_posts(&state, &name)
        .await
        .map_err(ApiError::context(CONTEXT))?;
    posts.truncate(MAX_ANALYZED_POSTS);

    let categorized = state.analyzer.categorize(posts).await;
    Ok(Json(analysis::bucket_by_category(&categorized)))
}

pub async fn update_stats_handler(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let summary = state
        .refresher
        .refresh_owner(&user_id)
        .await
        .map_err(ApiError::context("Failed to update subreddit stats"))?;

    Ok(Json(json!({
        "message": summary.message(),
        "updated": summary.updated,
        "total": summary.total,
    })))
}
