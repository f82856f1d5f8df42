use chrono::{DateTime, Utc};

use super::models::{Role, User};
use super::DbPool;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, can_donate, can_view_report, created_at";

pub async fn create_user(
    pool: &DbPool,
    id: &str,
    name: &str,
    email: &str,
    password_hash: &str,
    role: Role,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, can_donate, can_view_report, created_at)
         VALUES (?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    // Admins always see reports; donors opt in via permissions.
    .bind(role == Role::Admin)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_user(pool: &DbPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE lower(email) = lower(?)",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn list_donors(pool: &DbPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE role = 'donatur' ORDER BY name ASC, id ASC",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

/// Applies whichever flags are given; `None` leaves the stored value. Returns false when
/// no donor has `id`.
pub async fn update_donor_permissions(
    pool: &DbPool,
    id: &str,
    can_donate: Option<bool>,
    can_view_report: Option<bool>,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE users
         SET can_donate = COALESCE(?, can_donate),
             can_view_report = COALESCE(?, can_view_report)
         WHERE id = ? AND role = 'donatur'",
    )
    .bind(can_donate)
    .bind(can_view_report)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}
