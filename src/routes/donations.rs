use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthenticatedUser, MaybeUser};
use crate::db::{self, models::{DonationStatus, NotificationKind, Priority}, NewDonation};
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::payment::TokenRequest;
use crate::routes::{clean_opt, record_activity};
use crate::AppState;

pub const MIN_DONATION: i64 = 1_000;
const ANONYMOUS_DONOR: &str = "Hamba Allah";

#[derive(Deserialize)]
pub struct CreateDonationRequest {
    pub amount: i64,
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub status: String,
}

/// `DON-<unix seconds>-<8 hex>`; unique enough for the gateway and sortable by time.
fn new_order_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("DON-{}-{}", Utc::now().timestamp(), &suffix[..8])
}

fn parse_status(raw: &str) -> Option<DonationStatus> {
    match raw.trim().to_lowercase().as_str() {
        "pending" => Some(DonationStatus::Pending),
        "accepted" => Some(DonationStatus::Accepted),
        "expired" => Some(DonationStatus::Expired),
        _ => None,
    }
}

/// Public donation form. Callers with a valid session donate under their account.
pub async fn create_public_donation(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(req): Json<CreateDonationRequest>,
) -> ApiResult<impl IntoResponse> {
    submit_donation(&state, user.as_ref(), req).await
}

pub async fn create_donation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateDonationRequest>,
) -> ApiResult<impl IntoResponse> {
    submit_donation(&state, Some(&user), req).await
}

async fn submit_donation(
    state: &AppState,
    user: Option<&AuthenticatedUser>,
    req: CreateDonationRequest,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let donor_email = clean_opt(&req.donor_email);
    let message = clean_opt(&req.message);

    let mut errors = FieldErrors::new();
    errors.check(req.amount < MIN_DONATION, "amount", "Minimal donasi Rp 1.000");
    errors.check(
        donor_email.as_deref().is_some_and(|e| !e.contains('@')),
        "donor_email",
        "Format email tidak valid",
    );
    errors.check(
        message.as_deref().is_some_and(|m| m.chars().count() > 1000),
        "message",
        "Pesan maksimal 1000 karakter",
    );
    errors.into_result()?;

    let (user_id, donor_name, donor_email) = match user {
        Some(user) => {
            let account = db::get_user(&state.db, &user.id)
                .await?
                .ok_or(ApiError::Unauthorized)?;
            if !account.can_donate {
                return Err(ApiError::Forbidden("Akun ini tidak diizinkan berdonasi".to_string()));
            }
            (Some(account.id), account.name, Some(account.email))
        }
        None => (
            None,
            clean_opt(&req.donor_name).unwrap_or_else(|| ANONYMOUS_DONOR.to_string()),
            donor_email,
        ),
    };

    let id = Uuid::new_v4().to_string();
    let order_id = new_order_id();
    db::add_donation(
        &state.db,
        &NewDonation {
            id: &id,
            order_id: &order_id,
            user_id: user_id.as_deref(),
            donor_name: &donor_name,
            donor_email: donor_email.as_deref(),
            amount: req.amount,
            message: message.as_deref(),
        },
        Utc::now(),
    )
    .await?;

    let token = state
        .gateway
        .create_token(&TokenRequest {
            order_id: order_id.clone(),
            gross_amount: req.amount,
            donor_name,
            donor_email,
        })
        .await
        .map_err(|e| ApiError::BadGateway(format!("{} token for {}: {:#}", state.gateway.name(), order_id, e)))?;

    db::set_payment_token(&state.db, &id, &token.token, token.redirect_url.as_deref()).await?;
    tracing::info!(%order_id, amount = req.amount, registered = user_id.is_some(), "donation created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "order_id": order_id,
            "snap_token": token.token,
            "redirect_url": token.redirect_url,
        })),
    ))
}

pub async fn donation_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    let donations = db::list_donations_for_user(&state.db, &user.id).await?;
    Ok(Json(json!({ "donations": donations })))
}

pub async fn list_donations(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    let status = match params.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(
            parse_status(raw).ok_or_else(|| FieldErrors::single("status", "Status tidak dikenal"))?,
        ),
        None => None,
    };
    let donations = db::list_donations(&state.db, status).await?;
    let total: i64 = donations.iter().map(|d| d.amount).sum();
    Ok(Json(json!({ "donations": donations, "total_amount": total })))
}

pub async fn show_donation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<impl IntoResponse> {
    let donation = db::get_donation(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("Donasi"))?;
    Ok(Json(donation))
}

/// Manual confirmation, e.g. for cash handed over at the mosque.
pub async fn validate_donation(
    Path(id): Path<String>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<impl IntoResponse> {
    let status = match parse_status(&req.status) {
        Some(s @ (DonationStatus::Accepted | DonationStatus::Expired)) => s,
        _ => return Err(FieldErrors::single("status", "Status harus accepted atau expired")),
    };

    let before = db::get_donation(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("Donasi"))?;
    db::set_donation_status(&state.db, &id, status, Utc::now()).await?;

    record_activity(
        &state,
        &admin,
        "Validasi Donasi",
        format!("{} {} -> {}", before.order_id, before.status.as_str(), status.as_str()),
    )
    .await;

    if status == DonationStatus::Accepted && before.status != DonationStatus::Accepted {
        notify_donation_accepted(&state, &before.user_id, &before.order_id, before.amount).await;
    }

    let donation = db::get_donation(&state.db, &id)
        .await?
        .ok_or(ApiError::NotFound("Donasi"))?;
    Ok(Json(donation))
}

/// System notification for a registered donor whose donation was accepted.
pub(crate) async fn notify_donation_accepted(
    state: &AppState,
    user_id: &Option<String>,
    order_id: &str,
    amount: i64,
) {
    let Some(user_id) = user_id else {
        return;
    };
    let message = format!(
        "Jazakallahu khairan. Donasi {} sebesar Rp {} telah kami terima.",
        order_id, amount
    );
    if let Err(e) = state
        .notifications
        .enqueue(user_id, NotificationKind::System, "Donasi diterima", &message, Priority::High)
        .await
    {
        tracing::warn!(%order_id, "Failed to queue donation notification: {}", e);
    }
}
