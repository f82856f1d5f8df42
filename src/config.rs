//! Runtime configuration, read once from the environment at startup.

use std::env;
use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::notify::DEFAULT_BATCH_SIZE;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// `development` or `production`.
    pub env_mode: String,
    pub jwt_secret: String,
    pub jwt_issuer: Option<String>,
    pub allowed_origins: Vec<HeaderValue>,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    /// Payment gateway server key. Also the secret half of the callback signature.
    pub server_key: String,
    /// Snap transaction endpoint. `None` selects the offline gateway.
    pub snap_url: Option<String>,
    pub notification_batch_size: i64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    /// Include internal error messages in 500 responses.
    pub expose_errors: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let env_mode = env::var("RUST_ENV").unwrap_or_else(|_| "development".to_string());
        let production = env_mode == "production";

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("Invalid BIND_ADDR: {}", e))?;

        let allowed_origins = parse_origins(env::var("ALLOWED_ORIGINS").ok().as_deref());
        if production && allowed_origins.is_empty() {
            anyhow::bail!("ALLOWED_ORIGINS must contain at least one valid origin in production");
        }

        let server_key = env::var("MIDTRANS_SERVER_KEY").unwrap_or_default();
        if production && server_key.is_empty() {
            anyhow::bail!("MIDTRANS_SERVER_KEY must be set in production");
        }

        let notification_batch_size =
            check_batch_size(parse_or("NOTIFICATION_BATCH_SIZE", DEFAULT_BATCH_SIZE))?;

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://masjid.db?mode=rwc".to_string()),
            bind_addr,
            jwt_secret,
            jwt_issuer: env::var("JWT_ISSUER").ok(),
            allowed_origins: if allowed_origins.is_empty() {
                default_origins()
            } else {
                allowed_origins
            },
            rate_limit_per_second: parse_or("RATE_LIMIT_PER_SECOND", 1200),
            rate_limit_burst: parse_or("RATE_LIMIT_BURST", 2400),
            server_key,
            snap_url: env::var("MIDTRANS_SNAP_URL").ok().filter(|s| !s.trim().is_empty()),
            notification_batch_size,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            expose_errors: !production,
            env_mode,
        })
    }

    pub fn is_production(&self) -> bool {
        self.env_mode == "production"
    }

    /// Configuration for tests and local tooling: in-memory database, offline gateway.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            env_mode: "development".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: None,
            allowed_origins: default_origins(),
            rate_limit_per_second: 1200,
            rate_limit_burst: 2400,
            server_key: "SB-Mid-server-test".to_string(),
            snap_url: None,
            notification_batch_size: DEFAULT_BATCH_SIZE,
            admin_email: None,
            admin_password: None,
            expose_errors: true,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn check_batch_size(size: i64) -> anyhow::Result<i64> {
    if size < 1 {
        anyhow::bail!("Invalid NOTIFICATION_BATCH_SIZE: {} (must be at least 1)", size);
    }
    Ok(size)
}

fn parse_origins(raw: Option<&str>) -> Vec<HeaderValue> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid ALLOWED_ORIGINS entry: {}", trimmed);
                    None
                }
            }
        })
        .collect()
}

fn default_origins() -> Vec<HeaderValue> {
    vec![
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ]
}
