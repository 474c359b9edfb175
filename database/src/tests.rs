use crate::{Database, NewSubreddit};
use sidehustle_core::{CoreError, DatabaseError};
use std::env;
use tokio_test::assert_ok;

async fn setup_test_db() -> Database {
    let db_path = env::temp_dir().join(format!("test_sidehustle_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let db = Database::connect(&db_url, 2)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    db
}

fn new_subreddit<'a>(name: &'a str, owner: &'a str) -> NewSubreddit<'a> {
    NewSubreddit {
        name,
        owner_user_id: owner,
        subscriber_count: 1000,
        post_count_24h: 12,
    }
}

#[tokio::test]
async fn test_database_connection_and_migrations() {
    let db = setup_test_db().await;
    assert!(db.list_all_subreddits().await.unwrap().is_empty());

    // Migrations are idempotent.
    assert_ok!(db.run_migrations().await);
}

#[tokio::test]
async fn test_insert_and_find() {
    let db = setup_test_db().await;

    let inserted = db
        .insert_subreddit(new_subreddit("sidehustle", "user-1"))
        .await
        .unwrap();
    assert_eq!(inserted.name, "sidehustle");
    assert_eq!(inserted.subscriber_count, 1000);
    assert_eq!(inserted.post_count_24h, 12);
    assert!(uuid::Uuid::parse_str(&inserted.id).is_ok());

    let found = db
        .find_subreddit("user-1", "sidehustle")
        .await
        .unwrap()
        .expect("row should exist");
    assert_eq!(found.id, inserted.id);
    assert_eq!(found.owner_user_id, "user-1");

    assert!(db
        .find_subreddit("user-2", "sidehustle")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_per_owner_is_constraint_violation() {
    let db = setup_test_db().await;

    db.insert_subreddit(new_subreddit("sidehustle", "user-1"))
        .await
        .unwrap();
    let duplicate = db
        .insert_subreddit(new_subreddit("sidehustle", "user-1"))
        .await;
    assert!(matches!(
        duplicate,
        Err(CoreError::Database(DatabaseError::ConstraintViolation { .. }))
    ));

    // Another owner may track the same community.
    assert_ok!(
        db.insert_subreddit(new_subreddit("sidehustle", "user-2"))
            .await
    );
    assert_eq!(db.list_all_subreddits().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_is_scoped_and_ordered_by_last_updated() {
    let db = setup_test_db().await;

    let first = db
        .insert_subreddit(new_subreddit("beermoney", "user-1"))
        .await
        .unwrap();
    db.insert_subreddit(new_subreddit("sidehustle", "user-1"))
        .await
        .unwrap();
    db.insert_subreddit(new_subreddit("freelance", "user-2"))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert!(db
        .update_stats(&first.id, "user-1", 2000, 30)
        .await
        .unwrap());

    let listed = db.list_subreddits("user-1").await.unwrap();
    let names: Vec<_> = listed.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["beermoney", "sidehustle"]);
    assert_eq!(listed[0].subscriber_count, 2000);
    assert_eq!(listed[0].post_count_24h, 30);
    assert!(listed[0].last_updated > listed[0].created_at);
}

#[tokio::test]
async fn test_update_stats_requires_owner() {
    let db = setup_test_db().await;

    let row = db
        .insert_subreddit(new_subreddit("sidehustle", "user-1"))
        .await
        .unwrap();
    assert!(!db.update_stats(&row.id, "user-2", 1, 1).await.unwrap());
    assert!(!db.update_stats("missing", "user-1", 1, 1).await.unwrap());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let db = setup_test_db().await;

    db.insert_subreddit(new_subreddit("sidehustle", "user-1"))
        .await
        .unwrap();
    assert!(!db.delete_subreddit("user-2", "sidehustle").await.unwrap());
    assert!(db.delete_subreddit("user-1", "sidehustle").await.unwrap());
    assert!(!db.delete_subreddit("user-1", "sidehustle").await.unwrap());
    assert!(db.list_subreddits("user-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_in_memory_database() {
    let db = Database::in_memory().await.unwrap();
    db.run_migrations().await.unwrap();

    db.insert_subreddit(new_subreddit("sidehustle", "user-1"))
        .await
        .unwrap();
    assert_eq!(db.list_subreddits("user-1").await.unwrap().len(), 1);
}
