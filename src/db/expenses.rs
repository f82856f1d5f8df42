use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::models::Expense;
use super::DbPool;

const EXPENSE_SELECT: &str = "SELECT e.id, e.amount, e.category_id, c.name AS category_name, \
     e.project_id, p.name AS project_name, e.description, e.created_at, e.updated_at \
     FROM expenses e \
     JOIN categories c ON c.id = e.category_id \
     JOIN projects p ON p.id = e.project_id";

pub struct ExpenseInput<'a> {
    pub amount: i64,
    pub category_id: &'a str,
    pub project_id: i64,
    pub description: &'a str,
}

pub async fn create_expense(
    pool: &DbPool,
    input: &ExpenseInput<'_>,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO expenses (amount, category_id, project_id, description, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.amount)
    .bind(input.category_id)
    .bind(input.project_id)
    .bind(input.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

pub async fn update_expense(
    pool: &DbPool,
    id: i64,
    input: &ExpenseInput<'_>,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE expenses SET amount = ?, category_id = ?, project_id = ?, description = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(input.amount)
    .bind(input.category_id)
    .bind(input.project_id)
    .bind(input.description)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete_expense(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM expenses WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn get_expense(pool: &DbPool, id: i64) -> Result<Option<Expense>, sqlx::Error> {
    sqlx::query_as::<_, Expense>(&format!("{} WHERE e.id = ?", EXPENSE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_expenses(
    pool: &DbPool,
    project_id: Option<i64>,
) -> Result<Vec<Expense>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(EXPENSE_SELECT);
    if let Some(project_id) = project_id {
        qb.push(" WHERE e.project_id = ").push_bind(project_id);
    }
    qb.push(" ORDER BY e.created_at DESC, e.id DESC");
    qb.build_query_as::<Expense>().fetch_all(pool).await
}
