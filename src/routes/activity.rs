use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AdminUser;
use crate::db;
use crate::error::ApiResult;
use crate::routes::csv_response;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

#[derive(Deserialize)]
pub struct ActivityParams {
    pub limit: Option<i64>,
}

pub async fn list_activity(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<ActivityParams>,
) -> ApiResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let logs = db::list_activity(&state.db, limit).await?;
    Ok(Json(json!({ "activities": logs })))
}

pub async fn export_activity_csv(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let logs = db::list_activity(&state.db, i64::MAX).await?;

    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(["id", "user_id", "activity", "detail", "created_at"])
        .map_err(anyhow::Error::from)?;
    for a in logs {
        w.write_record([
            a.id.to_string(),
            a.user_id,
            a.activity,
            a.detail.unwrap_or_default(),
            a.created_at.to_rfc3339(),
        ])
        .map_err(anyhow::Error::from)?;
    }
    let body = w.into_inner().map_err(|e| anyhow::anyhow!("csv flush: {}", e))?;
    Ok(csv_response(body, "activity_logs.csv"))
}
