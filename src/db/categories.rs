use chrono::{DateTime, Utc};

use super::models::Category;
use super::DbPool;

/// Category ids are `KT` followed by a zero-padded sequence number.
pub fn category_id_for(seq: i64) -> String {
    format!("KT{:03}", seq)
}

/// Creates a category under the next free `KTnnn` id and returns it.
pub async fn create_category(
    pool: &DbPool,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Category, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let (max_seq,): (Option<i64>,) = sqlx::query_as(
        "SELECT MAX(CAST(SUBSTR(id, 3) AS INTEGER)) FROM categories WHERE id LIKE 'KT%'",
    )
    .fetch_one(&mut *tx)
    .await?;
    let id = category_id_for(max_seq.unwrap_or(0) + 1);

    sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Category {
        id,
        name: name.to_string(),
        created_at: now,
    })
}

pub async fn list_categories(pool: &DbPool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT id, name, created_at FROM categories ORDER BY id ASC")
        .fetch_all(pool)
        .await
}

pub async fn get_category(pool: &DbPool, id: &str) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT id, name, created_at FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Case-insensitive lookup, optionally ignoring one id (the row being renamed).
pub async fn find_category_by_name(
    pool: &DbPool,
    name: &str,
    except_id: Option<&str>,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "SELECT id, name, created_at FROM categories
         WHERE lower(name) = lower(?) AND (? IS NULL OR id <> ?)",
    )
    .bind(name)
    .bind(except_id)
    .bind(except_id)
    .fetch_optional(pool)
    .await
}

pub async fn rename_category(pool: &DbPool, id: &str, name: &str) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE categories SET name = ? WHERE id = ?")
        .bind(name)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete_category(pool: &DbPool, id: &str) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn count_category_expenses(pool: &DbPool, id: &str) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM expenses WHERE category_id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
