use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db::{self, ExpenseInput};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::routes::record_activity;
use crate::AppState;

#[derive(Deserialize)]
pub struct ExpenseRequest {
    pub amount: i64,
    pub category_id: String,
    pub project_id: i64,
    pub description: String,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub project_id: Option<i64>,
}

async fn validate(state: &AppState, req: &ExpenseRequest) -> ApiResult<()> {
    let mut errors = FieldErrors::new();
    errors.check(req.amount <= 0, "amount", "Jumlah pengeluaran harus lebih dari 0");
    errors.check(req.description.trim().is_empty(), "description", "Keterangan wajib diisi");
    if db::get_category(&state.db, req.category_id.trim()).await?.is_none() {
        errors.add("category_id", "Kategori tidak ditemukan");
    }
    if db::get_project(&state.db, req.project_id).await?.is_none() {
        errors.add("project_id", "Proyek tidak ditemukan");
    }
    errors.into_result()
}

/// Soft check only: spending past a project's target is allowed but flagged.
async fn target_warning(state: &AppState, project_id: i64) -> ApiResult<Option<String>> {
    let Some(project) = db::get_project(&state.db, project_id).await? else {
        return Ok(None);
    };
    let spent = db::project_expense_total(&state.db, project_id).await?;
    if spent > project.target {
        tracing::warn!(project_id, spent, target = project.target, "project spending exceeds target");
        return Ok(Some(format!(
            "Total pengeluaran proyek {} (Rp {}) melebihi target dana (Rp {})",
            project.name, spent, project.target
        )));
    }
    Ok(None)
}

pub async fn list_expenses(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    let expenses = db::list_expenses(&state.db, params.project_id).await?;
    let total: i64 = expenses.iter().map(|e| e.amount).sum();
    Ok(Json(json!({ "expenses": expenses, "total_amount": total })))
}

pub async fn show_expense(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let expense = db::get_expense(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Pengeluaran"))?;
    Ok(Json(expense))
}

pub async fn create_expense(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<ExpenseRequest>,
) -> ApiResult<impl IntoResponse> {
    validate(&state, &req).await?;
    let id = db::create_expense(
        &state.db,
        &ExpenseInput {
            amount: req.amount,
            category_id: req.category_id.trim(),
            project_id: req.project_id,
            description: req.description.trim(),
        },
        Utc::now(),
    )
    .await?;

    record_activity(
        &state,
        &admin,
        "Tambah Pengeluaran",
        format!("#{} Rp {} proyek #{}: {}", id, req.amount, req.project_id, req.description.trim()),
    )
    .await;

    let expense = db::get_expense(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Pengeluaran"))?;
    let warning = target_warning(&state, req.project_id).await?;
    Ok((StatusCode::CREATED, Json(json!({ "expense": expense, "warning": warning }))))
}

pub async fn update_expense(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<ExpenseRequest>,
) -> ApiResult<impl IntoResponse> {
    if db::get_expense(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("Pengeluaran"));
    }
    validate(&state, &req).await?;
    db::update_expense(
        &state.db,
        id,
        &ExpenseInput {
            amount: req.amount,
            category_id: req.category_id.trim(),
            project_id: req.project_id,
            description: req.description.trim(),
        },
        Utc::now(),
    )
    .await?;

    record_activity(
        &state,
        &admin,
        "Ubah Pengeluaran",
        format!("#{} Rp {} proyek #{}", id, req.amount, req.project_id),
    )
    .await;

    let expense = db::get_expense(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Pengeluaran"))?;
    let warning = target_warning(&state, req.project_id).await?;
    Ok(Json(json!({ "expense": expense, "warning": warning })))
}

pub async fn delete_expense(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let expense = db::get_expense(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Pengeluaran"))?;
    db::delete_expense(&state.db, id).await?;
    record_activity(
        &state,
        &admin,
        "Hapus Pengeluaran",
        format!("#{} Rp {} proyek {}", id, expense.amount, expense.project_name),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}
