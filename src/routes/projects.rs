use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db::{self, models::ProjectSummary, ProjectInput};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::routes::{clean_opt, record_activity};
use crate::AppState;

#[derive(Deserialize)]
pub struct ProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub target: i64,
    /// Opaque reference to an already-stored image.
    pub image: Option<String>,
}

fn validate(req: &ProjectRequest) -> Result<(), ApiError> {
    let name = req.name.trim();
    let mut errors = FieldErrors::new();
    errors.check(name.is_empty(), "name", "Nama proyek wajib diisi");
    errors.check(name.chars().count() > 255, "name", "Nama proyek maksimal 255 karakter");
    errors.check(req.target <= 0, "target", "Target dana harus lebih dari 0");
    errors.into_result()
}

fn summary_json(summary: &ProjectSummary) -> serde_json::Value {
    json!({
        "id": summary.project.id,
        "name": summary.project.name,
        "description": summary.project.description,
        "target": summary.project.target,
        "image": summary.project.image,
        "created_at": summary.project.created_at,
        "updated_at": summary.project.updated_at,
        "total_expenses": summary.total_expenses,
        "remaining": summary.remaining(),
    })
}

pub async fn list_projects(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let projects = db::list_projects(&state.db).await?;
    let projects: Vec<_> = projects.iter().map(summary_json).collect();
    Ok(Json(json!({ "projects": projects })))
}

pub async fn show_project(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let project = db::get_project(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Proyek"))?;
    let total_expenses = db::project_expense_total(&state.db, id).await?;
    Ok(Json(summary_json(&ProjectSummary {
        project,
        total_expenses,
    })))
}

pub async fn create_project(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    validate(&req)?;
    let description = clean_opt(&req.description);
    let image = clean_opt(&req.image);
    let id = db::create_project(
        &state.db,
        &ProjectInput {
            name: req.name.trim(),
            description: description.as_deref(),
            target: req.target,
            image: image.as_deref(),
        },
        Utc::now(),
    )
    .await?;

    record_activity(
        &state,
        &admin,
        "Tambah Proyek",
        format!("#{} {} (target Rp {})", id, req.name.trim(), req.target),
    )
    .await;

    let project = db::get_project(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Proyek"))?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<impl IntoResponse> {
    validate(&req)?;
    let description = clean_opt(&req.description);
    let image = clean_opt(&req.image);
    let updated = db::update_project(
        &state.db,
        id,
        &ProjectInput {
            name: req.name.trim(),
            description: description.as_deref(),
            target: req.target,
            image: image.as_deref(),
        },
        Utc::now(),
    )
    .await?;
    if !updated {
        return Err(ApiError::NotFound("Proyek"));
    }

    record_activity(&state, &admin, "Ubah Proyek", format!("#{} {}", id, req.name.trim())).await;

    let project = db::get_project(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Proyek"))?;
    Ok(Json(project))
}

pub async fn delete_project(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let project = db::get_project(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Proyek"))?;
    if db::count_project_expenses(&state.db, id).await? > 0 {
        return Err(ApiError::Conflict(
            "Proyek masih memiliki data pengeluaran".to_string(),
        ));
    }
    db::delete_project(&state.db, id).await?;
    record_activity(&state, &admin, "Hapus Proyek", format!("#{} {}", id, project.name)).await;
    Ok(StatusCode::NO_CONTENT)
}
