pub mod activity_repo;
pub mod archive_repo;
pub mod block_repo;
pub mod favorite_repo;
pub mod row_locks;
pub mod schema;
pub mod scheduled_activity_repo;
pub mod signup_repo;
pub mod user_repo;
pub mod waitlist_repo;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(10));
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;
    schema::init(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database; every connection to `:memory:` is a
/// separate database, so the pool must never open a second one.
pub async fn connect_in_memory() -> sqlx::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    schema::init(&pool).await?;
    Ok(pool)
}
