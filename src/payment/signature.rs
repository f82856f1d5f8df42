use sha2::{Digest, Sha512};

use crate::db::models::DonationStatus;

/// `hex(sha512(order_id + status_code + gross_amount + server_key))`, lowercase.
pub fn callback_signature(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_callback_signature(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    signature: &str,
) -> bool {
    let expected = callback_signature(order_id, status_code, gross_amount, server_key);
    let given = signature.trim().to_ascii_lowercase();
    // Constant time over equal-length inputs.
    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Maps a gateway `transaction_status` (and `fraud_status` for card captures) to the
/// donation lifecycle. Unknown statuses yield `None`.
pub fn map_transaction_status(transaction_status: &str, fraud_status: Option<&str>) -> Option<DonationStatus> {
    match transaction_status.to_ascii_lowercase().as_str() {
        "capture" => match fraud_status.map(|f| f.to_ascii_lowercase()) {
            Some(ref f) if f == "challenge" => Some(DonationStatus::Pending),
            Some(ref f) if f == "deny" => Some(DonationStatus::Expired),
            _ => Some(DonationStatus::Accepted),
        },
        "settlement" => Some(DonationStatus::Accepted),
        "pending" => Some(DonationStatus::Pending),
        "deny" | "cancel" | "expire" | "failure" => Some(DonationStatus::Expired),
        _ => None,
    }
}
