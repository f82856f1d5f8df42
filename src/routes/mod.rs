pub mod activity;
pub mod callback;
pub mod categories;
pub mod donations;
pub mod donors;
pub mod expenses;
pub mod notifications;
pub mod projects;
pub mod reports;

use chrono::Utc;

use crate::auth::AuthenticatedUser;
use crate::AppState;

/// Appends to the activity log. A failed write is logged but never fails the request
/// that performed the action.
pub(crate) async fn record_activity(state: &AppState, user: &AuthenticatedUser, activity: &str, detail: String) {
    if let Err(e) = crate::db::log_activity(&state.db, &user.id, activity, Some(&detail), Utc::now()).await {
        tracing::warn!("Activity log write failed ({}): {}", activity, e);
    }
}

/// Trims and drops empty optional text.
pub(crate) fn clean_opt(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Wraps a rendered CSV document as a file download.
pub(crate) fn csv_response(body: Vec<u8>, filename: &'static str) -> axum::response::Response {
    use axum::http::{header, HeaderValue};

    let mut resp = axum::response::Response::new(body.into());
    let headers = resp.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8"));
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename={}", filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    resp
}
