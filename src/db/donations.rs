use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use super::models::{Donation, DonationStatus};
use super::DbPool;

const DONATION_COLUMNS: &str = "id, order_id, user_id, donor_name, donor_email, amount, message, status, \
     payment_type, transaction_id, transaction_time, snap_token, redirect_url, created_at, updated_at";

pub struct NewDonation<'a> {
    pub id: &'a str,
    pub order_id: &'a str,
    pub user_id: Option<&'a str>,
    pub donor_name: &'a str,
    pub donor_email: Option<&'a str>,
    pub amount: i64,
    pub message: Option<&'a str>,
}

/// Fields reported by the gateway callback. `None` keeps the stored value.
#[derive(Debug, Default, Clone)]
pub struct PaymentUpdate {
    pub payment_type: Option<String>,
    pub transaction_id: Option<String>,
    pub transaction_time: Option<String>,
}

pub async fn add_donation(
    pool: &DbPool,
    donation: &NewDonation<'_>,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO donations (id, order_id, user_id, donor_name, donor_email, amount, message, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
    )
    .bind(donation.id)
    .bind(donation.order_id)
    .bind(donation.user_id)
    .bind(donation.donor_name)
    .bind(donation.donor_email)
    .bind(donation.amount)
    .bind(donation.message)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_payment_token(
    pool: &DbPool,
    id: &str,
    snap_token: &str,
    redirect_url: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE donations SET snap_token = ?, redirect_url = ? WHERE id = ?")
        .bind(snap_token)
        .bind(redirect_url)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_donation(pool: &DbPool, id: &str) -> Result<Option<Donation>, sqlx::Error> {
    sqlx::query_as::<_, Donation>(&format!("SELECT {} FROM donations WHERE id = ?", DONATION_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_donation_by_order_id(
    pool: &DbPool,
    order_id: &str,
) -> Result<Option<Donation>, sqlx::Error> {
    sqlx::query_as::<_, Donation>(&format!(
        "SELECT {} FROM donations WHERE order_id = ?",
        DONATION_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_donations(
    pool: &DbPool,
    status: Option<DonationStatus>,
) -> Result<Vec<Donation>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {} FROM donations", DONATION_COLUMNS));
    if let Some(status) = status {
        qb.push(" WHERE status = ").push_bind(status);
    }
    qb.push(" ORDER BY created_at DESC, id DESC");
    qb.build_query_as::<Donation>().fetch_all(pool).await
}

pub async fn list_donations_for_user(
    pool: &DbPool,
    user_id: &str,
) -> Result<Vec<Donation>, sqlx::Error> {
    sqlx::query_as::<_, Donation>(&format!(
        "SELECT {} FROM donations WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        DONATION_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Records a gateway callback as a single UPDATE. Only real transitions write: accepted
/// is final, a replay of the current status is a no-op, and an expired donation never
/// returns to pending. Returns whether a row changed.
pub async fn apply_payment_update(
    pool: &DbPool,
    order_id: &str,
    status: DonationStatus,
    payment: &PaymentUpdate,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "UPDATE donations
         SET status = ?,
             payment_type = COALESCE(?, payment_type),
             transaction_id = COALESCE(?, transaction_id),
             transaction_time = COALESCE(?, transaction_time),
             updated_at = ?
         WHERE order_id = ?
           AND status <> 'accepted'
           AND status <> ?
           AND NOT (status = 'expired' AND ? = 'pending')",
    )
    .bind(status)
    .bind(payment.payment_type.as_deref())
    .bind(payment.transaction_id.as_deref())
    .bind(payment.transaction_time.as_deref())
    .bind(now)
    .bind(order_id)
    .bind(status)
    .bind(status)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Manual validation by an admin. Unlike the callback path this may overrule any status.
pub async fn set_donation_status(
    pool: &DbPool,
    id: &str,
    status: DonationStatus,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE donations SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
