use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::routes::record_activity;
use crate::AppState;

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

async fn validate_name(state: &AppState, name: &str, except_id: Option<&str>) -> ApiResult<()> {
    let mut errors = FieldErrors::new();
    errors.check(name.is_empty(), "name", "Nama kategori wajib diisi");
    errors.check(name.chars().count() > 100, "name", "Nama kategori maksimal 100 karakter");
    if errors.is_empty() && db::find_category_by_name(&state.db, name, except_id).await?.is_some() {
        errors.add("name", "Nama kategori sudah digunakan");
    }
    errors.into_result()
}

pub async fn list_categories(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let categories = db::list_categories(&state.db).await?;
    Ok(Json(json!({ "categories": categories })))
}

pub async fn show_category(
    Path(id): Path<String>,
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let category = db::get_category(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("Kategori"))?;
    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim();
    validate_name(&state, name, None).await?;

    let category = db::create_category(&state.db, name, Utc::now()).await?;
    record_activity(&state, &admin, "Tambah Kategori", format!("{} {}", category.id, category.name)).await;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    Path(id): Path<String>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CategoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim();
    if db::get_category(&state.db, &id).await?.is_none() {
        return Err(ApiError::NotFound("Kategori"));
    }
    validate_name(&state, name, Some(&id)).await?;

    db::rename_category(&state.db, &id, name).await?;
    record_activity(&state, &admin, "Ubah Kategori", format!("{} {}", id, name)).await;

    let category = db::get_category(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("Kategori"))?;
    Ok(Json(category))
}

pub async fn delete_category(
    Path(id): Path<String>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let category = db::get_category(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("Kategori"))?;
    if db::count_category_expenses(&state.db, &id).await? > 0 {
        return Err(ApiError::Conflict(
            "Kategori masih digunakan oleh data pengeluaran".to_string(),
        ));
    }
    db::delete_category(&state.db, &id).await?;
    record_activity(&state, &admin, "Hapus Kategori", format!("{} {}", category.id, category.name)).await;
    Ok(StatusCode::NO_CONTENT)
}
