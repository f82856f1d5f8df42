use chrono::{DateTime, Utc};

use super::models::{Project, ProjectSummary};
use super::DbPool;

pub struct ProjectInput<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub target: i64,
    pub image: Option<&'a str>,
}

pub async fn create_project(
    pool: &DbPool,
    input: &ProjectInput<'_>,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO projects (name, description, target, image, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(input.name)
    .bind(input.description)
    .bind(input.target)
    .bind(input.image)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(res.last_insert_rowid())
}

pub async fn update_project(
    pool: &DbPool,
    id: i64,
    input: &ProjectInput<'_>,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE projects SET name = ?, description = ?, target = ?, image = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(input.name)
    .bind(input.description)
    .bind(input.target)
    .bind(input.image)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete_project(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn get_project(pool: &DbPool, id: i64) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "SELECT id, name, description, target, image, created_at, updated_at FROM projects WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_projects(pool: &DbPool) -> Result<Vec<ProjectSummary>, sqlx::Error> {
    sqlx::query_as::<_, ProjectSummary>(
        "SELECT p.id, p.name, p.description, p.target, p.image, p.created_at, p.updated_at,
                COALESCE(SUM(e.amount), 0) AS total_expenses
         FROM projects p
         LEFT JOIN expenses e ON e.project_id = p.id
         GROUP BY p.id
         ORDER BY p.created_at DESC, p.id DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn project_expense_total(pool: &DbPool, project_id: i64) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM expenses WHERE project_id = ?")
            .bind(project_id)
            .fetch_one(pool)
            .await?;
    Ok(total)
}

pub async fn count_project_expenses(pool: &DbPool, project_id: i64) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM expenses WHERE project_id = ?")
        .bind(project_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
