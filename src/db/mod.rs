use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

pub mod models;

mod activity;
mod categories;
mod donations;
mod expenses;
mod notifications;
mod projects;
mod reports;
mod users;

pub use activity::*;
pub use categories::*;
pub use donations::*;
pub use expenses::*;
pub use notifications::*;
pub use projects::*;
pub use reports::*;
pub use users::*;

pub type DbPool = SqlitePool;

pub async fn init_pool(database_url: &str) -> anyhow::Result<DbPool> {
    if is_memory_url(database_url) {
        return init_memory_pool().await;
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(60))
        .connect_with(options)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// A migrated single-connection in-memory database. Each call yields a fresh, empty schema.
pub async fn init_memory_pool() -> anyhow::Result<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    // Every connection to :memory: is its own database, so the pool must never
    // open a second one or recycle the first.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn is_memory_url(url: &str) -> bool {
    url == "sqlite::memory:" || url.contains(":memory:") || url.contains("mode=memory")
}
