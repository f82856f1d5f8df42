use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::routes::record_activity;
use crate::AppState;

#[derive(Deserialize)]
pub struct PermissionRequest {
    pub can_donate: Option<bool>,
    pub can_view_report: Option<bool>,
}

pub async fn index(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let donors = db::list_donors(&state.db).await?;
    Ok(Json(json!({ "donors": donors })))
}

pub async fn update_permissions(
    Path(id): Path<String>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<PermissionRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.can_donate.is_none() && req.can_view_report.is_none() {
        return Err(FieldErrors::single("can_donate", "Tidak ada izin yang diubah"));
    }

    if !db::update_donor_permissions(&state.db, &id, req.can_donate, req.can_view_report).await? {
        return Err(ApiError::NotFound("Donatur"));
    }

    let donor = db::get_user(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("Donatur"))?;
    record_activity(
        &state,
        &admin,
        "Ubah Izin Donatur",
        format!(
            "{} can_donate={} can_view_report={}",
            donor.email, donor.can_donate, donor.can_view_report
        ),
    )
    .await;
    Ok(Json(donor))
}
