use reddit_client::{RedditApiClient, RedditCredentials, SubredditSource};
use sidehustle_core::{analysis, normalize_subreddit_name, ErrorExt};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== Reddit API Fetch Test ===\n");

    let client_id = env::var("REDDIT_CLIENT_ID").unwrap_or_default();
    let client_secret = env::var("REDDIT_CLIENT_SECRET").unwrap_or_default();
    if client_id.is_empty() || client_secret.is_empty() {
        println!("❌ Set REDDIT_CLIENT_ID and REDDIT_CLIENT_SECRET first.");
        println!("   Create a 'script' app at https://www.reddit.com/prefs/apps");
        return Ok(());
    }

    let input = env::args().nth(1).unwrap_or_else(|| "r/sidehustle".to_string());
    let name = normalize_subreddit_name(&input)?;

    let mut credentials = RedditCredentials::new(
        client_id,
        client_secret,
        "sidehustle/0.1 fetch example".to_string(),
    );
    if let (Ok(username), Ok(password)) = (env::var("REDDIT_USERNAME"), env::var("REDDIT_PASSWORD"))
    {
        credentials = credentials.with_account(username, password);
    }

    let client = RedditApiClient::new(credentials)?;
    println!("🔍 Grant: {:?}\n", client.grant());

    match client.fetch_subreddit(&name).await {
        Ok(info) => println!("✅ r/{} has {} subscribers", info.name, info.subscribers),
        Err(e) => {
            println!("❌ {}", e.log_error().user_friendly_message());
            return Ok(());
        }
    }

    let mut posts = client.fetch_new_posts(&name).await?;
    let recent = analysis::count_recent(chrono::Utc::now(), &posts);
    println!("📊 {} posts fetched, {} in the last 24h\n", posts.len(), recent);

    analysis::rank_by_score(&mut posts);
    for post in posts.iter().take(5) {
        println!("  [{:>5}] {}", post.score, post.title);
        println!("          {}", post.url);
    }

    Ok(())
}
