mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use masjid_donasi::auth::hash_password;
use masjid_donasi::db::{self, models::{DonationStatus, Role}, ExpenseInput, NewDonation, ProjectInput};

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).single().expect("valid date")
}

async fn seed_donation(app: &common::TestApp, order_id: &str, amount: i64, status: DonationStatus, when: DateTime<Utc>) {
    db::add_donation(
        &app.state.db,
        &NewDonation {
            id: order_id,
            order_id,
            user_id: None,
            donor_name: "Hamba Allah",
            donor_email: None,
            amount,
            message: None,
        },
        when,
    )
    .await
    .expect("add donation");
    db::set_donation_status(&app.state.db, order_id, status, when)
        .await
        .expect("set status");
}

#[tokio::test]
async fn categories_get_sequential_codes() {
    let app = common::test_app().await;
    let admin = app.user("admin", Role::Admin).await;

    let mut ids = Vec::new();
    for name in ["Material", "Upah Tukang", "Konsumsi"] {
        let (status, body) = app
            .send(Method::POST, "/api/KategoriPengeluaran", Some(&admin), Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        ids.push(body["id"].as_str().expect("id").to_string());
    }
    assert_eq!(ids, vec!["KT001", "KT002", "KT003"]);

    let (status, body) = app
        .send(Method::POST, "/api/KategoriPengeluaran", Some(&admin), Some(json!({ "name": "material" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["name"].is_array());
}

#[tokio::test]
async fn expense_past_target_is_saved_with_warning() {
    let app = common::test_app().await;
    let admin = app.user("admin", Role::Admin).await;

    let (_, category) = app
        .send(Method::POST, "/api/KategoriPengeluaran", Some(&admin), Some(json!({ "name": "Material" })))
        .await;
    let (status, project) = app
        .send(
            Method::POST,
            "/api/ProyekPembangunan",
            Some(&admin),
            Some(json!({ "name": "Renovasi Mihrab", "target": 1_000_000 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", project);
    let project_id = project["id"].as_i64().expect("project id");

    let expense = |amount: i64| {
        json!({
            "amount": amount,
            "category_id": category["id"],
            "project_id": project_id,
            "description": "Semen dan pasir",
        })
    };

    let (status, body) = app
        .send(Method::POST, "/api/Pengeluaran", Some(&admin), Some(expense(600_000)))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["warning"].is_null());

    let (status, body) = app
        .send(Method::POST, "/api/Pengeluaran", Some(&admin), Some(expense(500_000)))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["warning"].as_str().is_some_and(|w| w.contains("melebihi")));

    let (_, shown) = app
        .send(Method::GET, &format!("/api/ProyekPembangunan/{}", project_id), Some(&admin), None)
        .await;
    assert_eq!(shown["total_expenses"], 1_100_000);
    assert_eq!(shown["remaining"], -100_000);

    let (_, listed) = app
        .send(Method::GET, &format!("/api/Pengeluaran?project_id={}", project_id), Some(&admin), None)
        .await;
    assert_eq!(listed["total_amount"], 1_100_000);
    assert_eq!(listed["expenses"].as_array().map(Vec::len), Some(2));

    // Projects and categories with expenses cannot be removed.
    let (status, _) = app
        .send(Method::DELETE, &format!("/api/ProyekPembangunan/{}", project_id), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let category_uri = format!("/api/KategoriPengeluaran/{}", category["id"].as_str().expect("id"));
    let (status, _) = app.send(Method::DELETE, &category_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn expense_with_unknown_references_is_rejected() {
    let app = common::test_app().await;
    let admin = app.user("admin", Role::Admin).await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/Pengeluaran",
            Some(&admin),
            Some(json!({ "amount": 0, "category_id": "KT999", "project_id": 42, "description": " " })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    for field in ["amount", "category_id", "project_id", "description"] {
        assert!(body["errors"][field].is_array(), "missing error for {}", field);
    }
}

#[tokio::test]
async fn reports_balance_for_every_period() {
    let app = common::test_app().await;
    let admin = app.user("admin", Role::Admin).await;

    seed_donation(&app, "DON-1", 500_000, DonationStatus::Accepted, at(2025, 12, 30)).await;
    seed_donation(&app, "DON-2", 250_000, DonationStatus::Accepted, at(2026, 1, 5)).await;
    seed_donation(&app, "DON-3", 125_000, DonationStatus::Accepted, at(2026, 1, 20)).await;
    seed_donation(&app, "DON-4", 900_000, DonationStatus::Pending, at(2026, 1, 20)).await;
    seed_donation(&app, "DON-5", 700_000, DonationStatus::Expired, at(2026, 2, 1)).await;

    let category = db::create_category(&app.state.db, "Material", at(2025, 12, 1))
        .await
        .expect("category");
    let project_id = db::create_project(
        &app.state.db,
        &ProjectInput { name: "Menara", description: None, target: 2_000_000, image: None },
        at(2025, 12, 1),
    )
    .await
    .expect("project");
    for (amount, when) in [(100_000, at(2026, 1, 5)), (300_000, at(2026, 3, 2))] {
        db::create_expense(
            &app.state.db,
            &ExpenseInput { amount, category_id: &category.id, project_id, description: "Besi" },
            when,
        )
        .await
        .expect("expense");
    }

    let income = db::total_income(&app.state.db).await.expect("income");
    let expense = db::total_expense(&app.state.db).await.expect("expense");
    assert_eq!(income, 875_000);
    assert_eq!(expense, 400_000);

    for filter in ["harian", "bulanan", "tahunan"] {
        let (status, report) = app
            .send(Method::GET, &format!("/api/laporan-keuangan?filter={}", filter), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK, "{}", report);
        assert_eq!(report["filter"], filter);

        let rows = report["data"].as_array().expect("rows");
        let mut sum_in = 0;
        let mut sum_out = 0;
        for row in rows {
            let pemasukan = row["total_pemasukan"].as_i64().expect("in");
            let pengeluaran = row["total_pengeluaran"].as_i64().expect("out");
            assert_eq!(row["total_saldo"].as_i64(), Some(pemasukan - pengeluaran));
            sum_in += pemasukan;
            sum_out += pengeluaran;
        }
        assert_eq!(sum_in, income, "{}", filter);
        assert_eq!(sum_out, expense, "{}", filter);
        assert_eq!(report["ringkasan"]["total_pemasukan"], sum_in);
        assert_eq!(report["ringkasan"]["total_pengeluaran"], sum_out);
        assert_eq!(report["ringkasan"]["total_saldo"], income - expense);
    }

    let (_, monthly) = app.send(Method::GET, "/api/laporan-keuangan", Some(&admin), None).await;
    let periods: Vec<&str> = monthly["data"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|r| r["periode"].as_str())
        .collect();
    assert_eq!(periods, vec!["2025-12", "2026-01", "2026-03"]);

    let (status, _) = app
        .send(Method::GET, "/api/laporan-keuangan?filter=mingguan", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, projects) = app.send(Method::GET, "/api/laporan-keuangan/proyek", Some(&admin), None).await;
    assert_eq!(projects["projects"][0]["total_pengeluaran"], 400_000);
    assert_eq!(projects["projects"][0]["sisa_anggaran"], 1_600_000);
    assert_eq!(projects["projects"][0]["persentase_terpakai"], 20.0);

    let (status, csv) = app
        .send_raw(Method::GET, "/api/laporan-keuangan/export?filter=tahunan", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(csv).expect("utf8");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "periode,total_pemasukan,total_pengeluaran,total_saldo");
    assert_eq!(lines[1], "2025,500000,0,500000");
    assert_eq!(lines[2], "2026,375000,400000,-25000");
    assert_eq!(lines[3], "TOTAL,875000,400000,475000");
}

#[tokio::test]
async fn report_access_follows_donor_permission() {
    let app = common::test_app().await;
    let admin = app.user("admin", Role::Admin).await;
    let donor = app.user("donor-3", Role::Donatur).await;

    let (status, _) = app.send(Method::GET, "/api/laporan-keuangan", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.send(Method::GET, "/api/laporan-keuangan", Some(&donor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/admin/donatur/donor-3/permissions",
            Some(&admin),
            Some(json!({ "can_view_report": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, "/api/laporan-keuangan", Some(&donor), None).await;
    assert_eq!(status, StatusCode::OK);

    // Exports stay admin-only.
    let (status, _) = app
        .send_raw(Method::GET, "/api/laporan-keuangan/export", Some(&donor), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::PUT, "/api/admin/donatur/donor-3/permissions", Some(&admin), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = app
        .send(
            Method::PUT,
            "/api/admin/donatur/nobody/permissions",
            Some(&admin),
            Some(json!({ "can_donate": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_reject_donors() {
    let app = common::test_app().await;
    let donor = app.user("donor-4", Role::Donatur).await;
    for uri in [
        "/api/admin/donasi",
        "/api/ProyekPembangunan",
        "/api/Pengeluaran",
        "/api/KategoriPengeluaran",
        "/api/admin/notifikasi",
        "/api/admin/donatur",
        "/api/admin/activity-log",
    ] {
        let (status, _) = app.send(Method::GET, uri, Some(&donor), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
        let (status, _) = app.send(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn broadcast_reaches_donors_who_can_read_and_delete() {
    let app = common::test_app().await;
    let admin = app.user("admin", Role::Admin).await;
    let alice = app.user("alice", Role::Donatur).await;
    let bob = app.user("bob", Role::Donatur).await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/admin/notifikasi",
            Some(&admin),
            Some(json!({ "title": "Kajian Ahad", "message": "Ba'da subuh", "priority": "low" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["recipients"], 2);

    let (_, feed) = app.send(Method::GET, "/api/notifikasi", Some(&alice), None).await;
    assert_eq!(feed["unread"], 1);
    let id = feed["notifications"][0]["id"].as_i64().expect("id");
    assert!(feed["notifications"][0].get("processed").is_none());

    // Bob cannot touch Alice's notification.
    let (status, _) = app
        .send(Method::POST, &format!("/api/notifikasi/mark-as-read/{}", id), Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(Method::POST, &format!("/api/notifikasi/mark-as-read/{}", id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, feed) = app.send(Method::GET, "/api/notifikasi", Some(&alice), None).await;
    assert_eq!(feed["unread"], 0);
    assert_eq!(feed["notifications"][0]["status"], "read");

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/notifikasi/{}", id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, feed) = app.send(Method::GET, "/api/notifikasi", Some(&alice), None).await;
    assert_eq!(feed["notifications"].as_array().map(Vec::len), Some(0));

    let (_, all) = app
        .send(Method::GET, "/api/admin/notifikasi?kind=broadcast", Some(&admin), None)
        .await;
    let remaining = all["notifications"].as_array().expect("rows");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0]["user_id"], "bob");
    assert_eq!(remaining[0]["processed"], false);
}

#[tokio::test]
async fn register_then_login_with_password() {
    let app = common::test_app().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({ "name": "Siti", "email": "Siti@Example.com", "password": "rahasia123" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["role"], "donatur");

    let (status, _) = app
        .send(
            Method::POST,
            "/api/register",
            None,
            Some(json!({ "name": "Siti", "email": "siti@example.com", "password": "rahasia123" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "siti@example.com", "password": "salah-sekali" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = app
        .send(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "siti@example.com", "password": "rahasia123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", login);
    let token = login["token"].as_str().expect("token");

    let (status, me) = app.send(Method::GET, "/api/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "siti@example.com");
}

#[tokio::test]
async fn stored_hash_verifies_through_login() {
    let app = common::test_app().await;
    let hash = hash_password("bismillah99").expect("hash");
    db::create_user(&app.state.db, "admin-2", "Takmir", "takmir@masjid.test", &hash, Role::Admin, Utc::now())
        .await
        .expect("create admin");

    let (status, login) = app
        .send(
            Method::POST,
            "/api/login",
            None,
            Some(json!({ "email": "TAKMIR@masjid.test", "password": "bismillah99" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", login);
    assert_eq!(login["user"]["role"], "admin");
}

#[tokio::test]
async fn activity_log_exports_as_csv() {
    let app = common::test_app().await;
    let admin = app.user("admin", Role::Admin).await;
    app.send(Method::POST, "/api/KategoriPengeluaran", Some(&admin), Some(json!({ "name": "Listrik, Air" })))
        .await;

    let (status, body) = app
        .send_raw(Method::GET, "/api/admin/activity-log/export", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(body).expect("utf8");
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("id,user_id,activity,detail,created_at"));
    let row = lines.next().expect("one row");
    assert!(row.contains("admin,Tambah Kategori,\"KT001 Listrik, Air\""), "{}", row);
}
