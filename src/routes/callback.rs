use axum::{
    extract::{Json, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::db::{self, models::DonationStatus, PaymentUpdate};
use crate::error::{ApiError, ApiResult};
use crate::payment::{map_transaction_status, verify_callback_signature};
use crate::routes::donations::notify_donation_accepted;
use crate::AppState;

/// Body of the gateway's HTTP notification.
#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub payment_type: Option<String>,
    pub transaction_id: Option<String>,
    pub transaction_time: Option<String>,
}

pub async fn payment_callback(
    State(state): State<AppState>,
    Json(n): Json<PaymentNotification>,
) -> ApiResult<impl IntoResponse> {
    if !verify_callback_signature(
        &n.order_id,
        &n.status_code,
        &n.gross_amount,
        &state.config.server_key,
        &n.signature_key,
    ) {
        tracing::warn!(order_id = %n.order_id, "callback rejected: signature mismatch");
        return Err(ApiError::Forbidden("Invalid signature".to_string()));
    }

    let donation = db::find_donation_by_order_id(&state.db, &n.order_id)
        .await?
        .ok_or(ApiError::NotFound("Donasi"))?;

    let Some(status) = map_transaction_status(&n.transaction_status, n.fraud_status.as_deref()) else {
        tracing::info!(order_id = %n.order_id, status = %n.transaction_status, "callback ignored: unhandled status");
        return Ok(Json(json!({ "message": "ignored", "status": donation.status })));
    };

    let changed = db::apply_payment_update(
        &state.db,
        &n.order_id,
        status,
        &PaymentUpdate {
            payment_type: n.payment_type.clone(),
            transaction_id: n.transaction_id.clone(),
            transaction_time: n.transaction_time.clone(),
        },
        Utc::now(),
    )
    .await?;

    tracing::info!(
        order_id = %n.order_id,
        from = donation.status.as_str(),
        to = status.as_str(),
        changed,
        "payment callback processed"
    );

    if changed && status == DonationStatus::Accepted {
        notify_donation_accepted(&state, &donation.user_id, &donation.order_id, donation.amount).await;
    }

    let current = if changed { status } else { donation.status };
    Ok(Json(json!({ "message": "ok", "status": current })))
}
