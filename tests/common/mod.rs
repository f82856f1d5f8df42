#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use masjid_donasi::auth::{create_jwt, UserProfile};
use masjid_donasi::config::Config;
use masjid_donasi::db::{self, models::Role};
use masjid_donasi::notify::NotificationQueue;
use masjid_donasi::payment::OfflineGateway;
use masjid_donasi::{router, AppState};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Held so queue wake-ups have somewhere to go; no worker runs in these tests.
    _wake: mpsc::Receiver<()>,
}

pub async fn test_app() -> TestApp {
    test_app_with(Config::for_tests()).await
}

pub async fn test_app_with(config: Config) -> TestApp {
    let pool = db::init_memory_pool().await.expect("init pool");
    let (notifications, wake) = NotificationQueue::new(pool.clone());
    let state = AppState {
        db: pool,
        config: Arc::new(config),
        gateway: Arc::new(OfflineGateway),
        notifications,
    };
    TestApp {
        router: router(state.clone()),
        state,
        _wake: wake,
    }
}

impl TestApp {
    /// Creates a user directly in the database and returns a bearer token for it.
    pub async fn user(&self, id: &str, role: Role) -> String {
        let email = format!("{}@masjid.test", id);
        db::create_user(&self.state.db, id, id, &email, "unused", role, Utc::now())
            .await
            .expect("create user");
        create_jwt(
            &self.state.config,
            &UserProfile {
                id: id.to_string(),
                email,
                name: id.to_string(),
                role,
            },
        )
        .expect("token")
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let (status, bytes) = self.send_raw(method, uri, token, body).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, json)
    }

    pub async fn send_raw(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes()
            .to_vec();
        (status, bytes)
    }
}
