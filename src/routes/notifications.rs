use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{AdminUser, AuthenticatedUser};
use crate::db::{self, models::{NotificationKind, Priority}};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::routes::record_activity;
use crate::AppState;

#[derive(Deserialize)]
pub struct BroadcastRequest {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub priority: Priority,
}

#[derive(Deserialize)]
pub struct AdminListParams {
    pub kind: Option<NotificationKind>,
    pub limit: Option<i64>,
}

/// Admin view, including the delivery flag donors never see.
pub async fn admin_list(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<AdminListParams>,
) -> ApiResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(100).clamp(1, 500);
    let rows = db::list_notifications(&state.db, params.kind, limit).await?;
    let rows: Vec<_> = rows
        .into_iter()
        .map(|n| {
            json!({
                "id": n.id,
                "user_id": n.user_id,
                "kind": n.kind,
                "title": n.title,
                "message": n.message,
                "status": n.status,
                "priority": n.priority,
                "processed": n.processed,
                "created_at": n.created_at,
                "read_at": n.read_at,
            })
        })
        .collect();
    Ok(Json(json!({ "notifications": rows })))
}

pub async fn admin_broadcast(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<BroadcastRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = req.title.trim();
    let message = req.message.trim();
    let mut errors = FieldErrors::new();
    errors.check(title.is_empty(), "title", "Judul wajib diisi");
    errors.check(title.chars().count() > 255, "title", "Judul maksimal 255 karakter");
    errors.check(message.is_empty(), "message", "Pesan wajib diisi");
    errors.into_result()?;

    let recipients = state.notifications.broadcast(title, message, req.priority).await?;
    record_activity(
        &state,
        &admin,
        "Kirim Notifikasi",
        format!("{} ({} penerima, prioritas {:?})", title, recipients, req.priority),
    )
    .await;

    Ok((StatusCode::CREATED, Json(json!({ "recipients": recipients }))))
}

pub async fn admin_delete(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let notification = db::get_notification(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Notifikasi"))?;
    db::delete_notification(&state.db, id).await?;
    record_activity(
        &state,
        &admin,
        "Hapus Notifikasi",
        format!("#{} {} untuk {}", id, notification.title, notification.user_id),
    )
    .await;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's own feed.
pub async fn feed(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let notifications = db::list_user_notifications(&state.db, &user.id).await?;
    let unread = db::count_unread(&state.db, &user.id).await?;
    Ok(Json(json!({ "notifications": notifications, "unread": unread })))
}

pub async fn mark_as_read(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    if !db::mark_notification_read(&state.db, &user.id, id, Utc::now()).await? {
        return Err(ApiError::NotFound("Notifikasi"));
    }
    Ok(Json(json!({ "message": "ok" })))
}

pub async fn delete_own(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    if !db::delete_user_notification(&state.db, &user.id, id).await? {
        return Err(ApiError::NotFound("Notifikasi"));
    }
    Ok(StatusCode::NO_CONTENT)
}
