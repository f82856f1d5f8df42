use std::collections::BTreeMap;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// Field name → messages, rendered as the `errors` object of a 422 response.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    /// Records `message` against `field` when `failed` holds.
    pub fn check(&mut self, failed: bool, field: &str, message: &str) {
        if failed {
            self.add(field, message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Vec<String>> {
        self.0.get(field)
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }

    pub fn single(field: &str, message: impl Into<String>) -> ApiError {
        let mut errors = Self::new();
        errors.add(field, message);
        ApiError::Validation(errors)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation failed")]
    Validation(FieldErrors),
    #[error("Upstream error: {0}")]
    BadGateway(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// The underlying message of a 500, carried as a response extension. It reaches the
/// body only through [`expose_error_detail`].
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// Router middleware: copies [`ErrorDetail`] into the 500 body when `expose` is set.
/// Without it, or with `expose` false, clients only see the generic message.
pub async fn expose_error_detail(
    State(expose): State<bool>,
    req: Request,
    next: Next,
) -> Response {
    let mut resp = next.run(req).await;
    let Some(ErrorDetail(detail)) = resp.extensions_mut().remove::<ErrorDetail>() else {
        return resp;
    };
    if !expose {
        return resp;
    }
    (
        resp.status(),
        Json(json!({ "message": INTERNAL_MESSAGE, "error": detail })),
    )
        .into_response()
}

const INTERNAL_MESSAGE: &str = "Terjadi kesalahan server";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Unauthenticated" })),
            )
                .into_response(),
            ApiError::Forbidden(reason) => {
                (StatusCode::FORBIDDEN, Json(json!({ "message": reason }))).into_response()
            }
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": format!("{} tidak ditemukan", what) })),
            )
                .into_response(),
            ApiError::Conflict(reason) => {
                (StatusCode::CONFLICT, Json(json!({ "message": reason }))).into_response()
            }
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "Validasi gagal", "errors": errors })),
            )
                .into_response(),
            ApiError::BadGateway(reason) => {
                tracing::error!("Upstream failure: {}", reason);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "message": "Gagal menghubungi payment gateway" })),
                )
                    .into_response()
            }
            ApiError::Database(e) => internal(e.to_string()),
            ApiError::Internal(e) => internal(format!("{:#}", e)),
        }
    }
}

fn internal(message: String) -> Response {
    tracing::error!("Request failed: {}", message);
    let mut resp = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": INTERNAL_MESSAGE })),
    )
        .into_response();
    resp.extensions_mut().insert(ErrorDetail(message));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collect_per_field() {
        let mut errors = FieldErrors::new();
        errors.check(true, "amount", "must be positive");
        errors.check(false, "amount", "ignored");
        errors.add("amount", "too small");
        errors.add("name", "required");
        assert_eq!(errors.get("amount").map(|v| v.len()), Some(2));
        assert!(matches!(errors.into_result(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn validation_maps_to_422() {
        let resp = FieldErrors::single("name", "required").into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn database_errors_map_to_500() {
        let resp = ApiError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_detail_rides_in_extensions_not_body() {
        let resp = ApiError::Internal(anyhow::anyhow!("disk full")).into_response();
        let detail = resp.extensions().get::<ErrorDetail>().map(|d| d.0.clone());
        assert_eq!(detail.as_deref(), Some("disk full"));
    }
}
