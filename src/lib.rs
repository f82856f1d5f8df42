//! Mosque donation and construction-fund administration service.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod payment;
pub mod routes;

use config::Config;
use db::DbPool;
use notify::NotificationQueue;
use payment::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifications: NotificationQueue,
}

/// Every route of the service, with request tracing. Transport concerns (CORS, rate
/// limiting, security headers) are layered on by the binary.
pub fn router(state: AppState) -> Router {
    use routes::{activity, callback, categories, donations, donors, expenses, notifications, projects, reports};

    let expose_errors = state.config.expose_errors;
    Router::new()
        .route("/health", get(health_check))
        // Auth
        .route("/api/login", post(auth::login))
        .route("/api/register", post(auth::register))
        .route("/logout", post(auth::logout))
        .route("/api/me", get(auth::me))
        // Donations and the gateway webhook
        .route("/donasi", post(donations::create_public_donation))
        .route("/donasi/callback", post(callback::payment_callback))
        .route("/api/donasi", post(donations::create_donation))
        .route("/api/donasi/riwayat", get(donations::donation_history))
        .route("/api/admin/donasi", get(donations::list_donations))
        .route("/api/admin/donasi/{id}", get(donations::show_donation))
        .route("/api/admin/donasi/{id}/validasi", put(donations::validate_donation))
        // Projects, expenses, categories
        .route("/api/ProyekPembangunan", get(projects::list_projects).post(projects::create_project))
        .route(
            "/api/ProyekPembangunan/{id}",
            get(projects::show_project).put(projects::update_project).delete(projects::delete_project),
        )
        .route("/api/Pengeluaran", get(expenses::list_expenses).post(expenses::create_expense))
        .route(
            "/api/Pengeluaran/{id}",
            get(expenses::show_expense).put(expenses::update_expense).delete(expenses::delete_expense),
        )
        .route(
            "/api/KategoriPengeluaran",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/api/KategoriPengeluaran/{id}",
            get(categories::show_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Notifications
        .route(
            "/api/admin/notifikasi",
            get(notifications::admin_list).post(notifications::admin_broadcast),
        )
        .route("/api/admin/notifikasi/{id}", axum::routing::delete(notifications::admin_delete))
        .route("/api/notifikasi", get(notifications::feed))
        .route("/api/notifikasi/mark-as-read/{id}", post(notifications::mark_as_read))
        .route("/api/notifikasi/{id}", axum::routing::delete(notifications::delete_own))
        // Donor permissions
        .route("/api/admin/donatur", get(donors::index))
        .route("/api/admin/donatur/{id}/permissions", put(donors::update_permissions))
        // Reports and audit trail
        .route("/api/laporan-keuangan", get(reports::financial_report))
        .route("/api/laporan-keuangan/proyek", get(reports::project_report))
        .route("/api/laporan-keuangan/export", get(reports::export_report_csv))
        .route("/api/admin/activity-log", get(activity::list_activity))
        .route("/api/admin/activity-log/export", get(activity::export_activity_csv))
        .layer(middleware::from_fn_with_state(expose_errors, error::expose_error_detail))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
