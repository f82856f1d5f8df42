//! Payment gateway seam: token issuance for new donations and verification of the
//! gateway's callback signature.
//!
//! Two gateways exist. `SnapGateway` calls the hosted Snap endpoint over HTTP;
//! `OfflineGateway` issues local tokens and is selected when no endpoint is configured.

mod signature;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub use signature::{callback_signature, map_transaction_status, verify_callback_signature};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub order_id: String,
    pub gross_amount: i64,
    pub donor_name: String,
    pub donor_email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentToken {
    pub token: String,
    pub redirect_url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_token(&self, req: &TokenRequest) -> anyhow::Result<PaymentToken>;

    fn name(&self) -> &'static str;
}

pub struct SnapGateway {
    client: reqwest::Client,
    endpoint: String,
    server_key: String,
}

impl SnapGateway {
    pub fn new(endpoint: String, server_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            server_key,
        })
    }
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    async fn create_token(&self, req: &TokenRequest) -> anyhow::Result<PaymentToken> {
        let mut customer = json!({ "first_name": req.donor_name });
        if let Some(email) = &req.donor_email {
            customer["email"] = json!(email);
        }
        let body = json!({
            "transaction_details": {
                "order_id": req.order_id,
                "gross_amount": req.gross_amount,
            },
            "customer_details": customer,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.server_key, Some(""))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("snap responded {}: {}", status, text);
        }

        let token: PaymentToken = resp.json().await?;
        Ok(token)
    }

    fn name(&self) -> &'static str {
        "snap"
    }
}

/// Issues `offline-<order_id>` tokens without any network call.
pub struct OfflineGateway;

#[async_trait]
impl PaymentGateway for OfflineGateway {
    async fn create_token(&self, req: &TokenRequest) -> anyhow::Result<PaymentToken> {
        Ok(PaymentToken {
            token: format!("offline-{}", req.order_id),
            redirect_url: None,
        })
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

pub fn gateway_from_config(config: &Config) -> anyhow::Result<std::sync::Arc<dyn PaymentGateway>> {
    match &config.snap_url {
        Some(url) => Ok(std::sync::Arc::new(SnapGateway::new(
            url.clone(),
            config.server_key.clone(),
        )?)),
        None => {
            if config.is_production() {
                anyhow::bail!("MIDTRANS_SNAP_URL must be set in production");
            }
            tracing::warn!("MIDTRANS_SNAP_URL not set; using offline payment tokens");
            Ok(std::sync::Arc::new(OfflineGateway))
        }
    }
}
