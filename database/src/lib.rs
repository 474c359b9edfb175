use chrono::{DateTime, Utc};
use sidehustle_core::{CoreError, DatabaseError, TrackedSubreddit};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, error, info};
use uuid::Uuid;

#[cfg(test)]
mod tests;

const SELECT_COLUMNS: &str =
    "id, name, subscriber_count, post_count_24h, last_updated, owner_user_id, created_at";

/// Statistics to store for a newly tracked subreddit.
#[derive(Debug, Clone)]
pub struct NewSubreddit<'a> {
    pub name: &'a str,
    pub owner_user_id: &'a str,
    pub subscriber_count: i64,
    pub post_count_24h: i64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if missing) the SQLite database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, CoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| connection_failed(url, e))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| connection_failed(url, e))?;

        info!("Connected to database {}", url);
        Ok(Self { pool })
    }

    /// Private in-memory database. Limited to one connection because every
    /// SQLite memory connection is a separate database.
    pub async fn in_memory() -> Result<Self, CoreError> {
        Self::connect("sqlite::memory:", 1).await
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Migration failed: {}", e);
                DatabaseError::MigrationFailed {
                    migration: e.to_string(),
                }
            })?;
        debug!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts a tracked subreddit. A second row with the same name for the
    /// same owner is a `ConstraintViolation`.
    pub async fn insert_subreddit(
        &self,
        new: NewSubreddit<'_>,
    ) -> Result<TrackedSubreddit, CoreError> {
        let now = Utc::now();
        let tracked = TrackedSubreddit {
            id: Uuid::new_v4().to_string(),
            name: new.name.to_string(),
            subscriber_count: new.subscriber_count,
            post_count_24h: new.post_count_24h,
            last_updated: now,
            owner_user_id: new.owner_user_id.to_string(),
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO subreddits
                (id, name, subscriber_count, post_count_24h, last_updated, owner_user_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&tracked.id)
        .bind(&tracked.name)
        .bind(tracked.subscriber_count)
        .bind(tracked.post_count_24h)
        .bind(tracked.last_updated)
        .bind(&tracked.owner_user_id)
        .bind(tracked.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                CoreError::from(DatabaseError::ConstraintViolation {
                    constraint: "subreddits(name, owner_user_id)".to_string(),
                })
            }
            other => sql_error(other),
        })?;

        debug!(
            "Tracking r/{} for user {}",
            tracked.name, tracked.owner_user_id
        );
        Ok(tracked)
    }

    /// The owner's subreddits, most recently updated first.
    pub async fn list_subreddits(
        &self,
        owner_user_id: &str,
    ) -> Result<Vec<TrackedSubreddit>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subreddits WHERE owner_user_id = ? ORDER BY last_updated DESC, name",
            SELECT_COLUMNS
        ))
        .bind(owner_user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sql_error)?;

        rows.iter().map(tracked_from_row).collect()
    }

    pub async fn list_all_subreddits(&self) -> Result<Vec<TrackedSubreddit>, CoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subreddits ORDER BY owner_user_id, name",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(sql_error)?;

        rows.iter().map(tracked_from_row).collect()
    }

    pub async fn find_subreddit(
        &self,
        owner_user_id: &str,
        name: &str,
    ) -> Result<Option<TrackedSubreddit>, CoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subreddits WHERE owner_user_id = ? AND name = ?",
            SELECT_COLUMNS
        ))
        .bind(owner_user_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(sql_error)?;

        row.as_ref().map(tracked_from_row).transpose()
    }

    /// Overwrites the statistics of one row and stamps `last_updated`.
    /// Returns whether a row matched.
    pub async fn update_stats(
        &self,
        id: &str,
        owner_user_id: &str,
        subscriber_count: i64,
        post_count_24h: i64,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r#"
            UPDATE subreddits
            SET subscriber_count = ?, post_count_24h = ?, last_updated = ?
            WHERE id = ? AND owner_user_id = ?
            "#,
        )
        .bind(subscriber_count)
        .bind(post_count_24h)
        .bind(Utc::now())
        .bind(id)
        .bind(owner_user_id)
        .execute(&self.pool)
        .await
        .map_err(sql_error)?;

        Ok(result.rows_affected() > 0)
    }

    /// Removes the owner's row for `name`. Returns whether a row existed.
    pub async fn delete_subreddit(
        &self,
        owner_user_id: &str,
        name: &str,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM subreddits WHERE owner_user_id = ? AND name = ?")
            .bind(owner_user_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(sql_error)?;

        Ok(result.rows_affected() > 0)
    }
}

fn tracked_from_row(row: &SqliteRow) -> Result<TrackedSubreddit, CoreError> {
    Ok(TrackedSubreddit {
        id: row.try_get("id").map_err(sql_error)?,
        name: row.try_get("name").map_err(sql_error)?,
        subscriber_count: row.try_get("subscriber_count").map_err(sql_error)?,
        post_count_24h: row.try_get("post_count_24h").map_err(sql_error)?,
        last_updated: row
            .try_get::<DateTime<Utc>, _>("last_updated")
            .map_err(sql_error)?,
        owner_user_id: row.try_get("owner_user_id").map_err(sql_error)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(sql_error)?,
    })
}

fn sql_error(e: sqlx::Error) -> CoreError {
    match e {
        sqlx::Error::Database(ref db) if db.message().contains("database is locked") => {
            DatabaseError::DatabaseLocked.into()
        }
        other => DatabaseError::Sql(other).into(),
    }
}

fn connection_failed(url: &str, e: sqlx::Error) -> CoreError {
    error!("Failed to connect to database {}: {}", url, e);
    DatabaseError::ConnectionFailed {
        reason: e.to_string(),
    }
    .into()
}
