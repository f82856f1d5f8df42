use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor};

use super::models::{Notification, NotificationKind, Priority};
use super::DbPool;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, message, status, priority, processed, created_at, read_at";

pub struct NewNotification<'a> {
    pub user_id: &'a str,
    pub kind: NotificationKind,
    pub title: &'a str,
    pub message: &'a str,
    pub priority: Priority,
}

/// Inserts an unprocessed, unread notification. Takes any executor so broadcasts can
/// insert inside one transaction.
pub async fn insert_notification<'e, E>(
    executor: E,
    new: &NewNotification<'_>,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let res = sqlx::query(
        "INSERT INTO notifications (user_id, kind, title, message, status, priority, processed, created_at)
         VALUES (?, ?, ?, ?, 'sent', ?, 0, ?)",
    )
    .bind(new.user_id)
    .bind(new.kind)
    .bind(new.title)
    .bind(new.message)
    .bind(new.priority)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(res.last_insert_rowid())
}

/// Unprocessed notifications in delivery order: priority high to low, then oldest first.
pub async fn fetch_undelivered(pool: &DbPool, limit: i64) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {} FROM notifications WHERE processed = 0
         ORDER BY priority DESC, created_at ASC, id ASC LIMIT ?",
        NOTIFICATION_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Marks one row processed if nobody else has. The caller that gets `true` owns delivery.
pub async fn claim_notification(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE notifications SET processed = 1 WHERE id = ? AND processed = 0")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn release_notification(pool: &DbPool, id: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE notifications SET processed = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// A donor's feed, newest first.
pub async fn list_user_notifications(
    pool: &DbPool,
    user_id: &str,
) -> Result<Vec<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {} FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        NOTIFICATION_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_notifications(
    pool: &DbPool,
    kind: Option<NotificationKind>,
    limit: i64,
) -> Result<Vec<Notification>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM notifications", NOTIFICATION_COLUMNS));
    if let Some(kind) = kind {
        qb.push(" WHERE kind = ").push_bind(kind);
    }
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(limit);
    qb.build_query_as::<Notification>().fetch_all(pool).await
}

pub async fn get_notification(pool: &DbPool, id: i64) -> Result<Option<Notification>, sqlx::Error> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {} FROM notifications WHERE id = ?",
        NOTIFICATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn count_unread(pool: &DbPool, user_id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND status = 'sent'")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// `sent → read`. Scoped to the owner; re-reading keeps the first `read_at`.
pub async fn mark_notification_read(
    pool: &DbPool,
    user_id: &str,
    id: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE notifications SET status = 'read', read_at = COALESCE(read_at, ?)
         WHERE id = ? AND user_id = ?",
    )
    .bind(now)
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete_user_notification(
    pool: &DbPool,
    user_id: &str,
    id: i64,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete_notification(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM notifications WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
