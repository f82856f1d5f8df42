use chrono::{DateTime, Utc};

use super::models::ActivityLog;
use super::DbPool;

pub async fn log_activity(
    pool: &DbPool,
    user_id: &str,
    activity: &str,
    detail: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO activity_logs (user_id, activity, detail, created_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(activity)
        .bind(detail)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(())
}

/// Newest first.
pub async fn list_activity(pool: &DbPool, limit: i64) -> Result<Vec<ActivityLog>, sqlx::Error> {
    sqlx::query_as::<_, ActivityLog>(
        "SELECT id, user_id, activity, detail, created_at FROM activity_logs
         ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
