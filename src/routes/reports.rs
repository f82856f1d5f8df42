use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::{AdminUser, AuthenticatedUser};
use crate::db;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::routes::csv_response;
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Monthly,
    Yearly,
}

impl Period {
    /// Accepts `harian`, `bulanan` and `tahunan`; missing means monthly.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            None | Some("") | Some("bulanan") => Some(Self::Monthly),
            Some("harian") => Some(Self::Daily),
            Some("tahunan") => Some(Self::Yearly),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "harian",
            Self::Monthly => "bulanan",
            Self::Yearly => "tahunan",
        }
    }

    fn sql_format(&self) -> db::PeriodFormat {
        match self {
            Self::Daily => "%Y-%m-%d",
            Self::Monthly => "%Y-%m",
            Self::Yearly => "%Y",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PeriodRow {
    pub periode: String,
    pub total_pemasukan: i64,
    pub total_pengeluaran: i64,
    pub total_saldo: i64,
    pub persentase_pemasukan: f64,
    pub persentase_pengeluaran: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Summary {
    pub total_pemasukan: i64,
    pub total_pengeluaran: i64,
    pub total_saldo: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinancialReport {
    pub filter: &'static str,
    pub ringkasan: Summary,
    pub data: Vec<PeriodRow>,
}

#[derive(Deserialize)]
pub struct ReportParams {
    pub filter: Option<String>,
}

fn share(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 10_000.0).round() / 100.0
}

/// Merges per-period income and expense sums into ascending rows. `totals` are the
/// unfiltered income and expense sums; they become `ringkasan` and the base of the
/// percentages.
pub fn build_report(
    period: Period,
    income: &[(String, i64)],
    expense: &[(String, i64)],
    totals: (i64, i64),
) -> FinancialReport {
    let mut merged: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for (p, amount) in income {
        merged.entry(p.as_str()).or_default().0 += amount;
    }
    for (p, amount) in expense {
        merged.entry(p.as_str()).or_default().1 += amount;
    }

    let (total_in, total_out) = totals;

    let data = merged
        .into_iter()
        .map(|(p, (pemasukan, pengeluaran))| PeriodRow {
            periode: p.to_string(),
            total_pemasukan: pemasukan,
            total_pengeluaran: pengeluaran,
            total_saldo: pemasukan - pengeluaran,
            persentase_pemasukan: share(pemasukan, total_in),
            persentase_pengeluaran: share(pengeluaran, total_out),
        })
        .collect();

    FinancialReport {
        filter: period.label(),
        ringkasan: Summary {
            total_pemasukan: total_in,
            total_pengeluaran: total_out,
            total_saldo: total_in - total_out,
        },
        data,
    }
}

async fn load_report(state: &AppState, period: Period) -> ApiResult<FinancialReport> {
    let income = db::income_by_period(&state.db, period.sql_format()).await?;
    let expense = db::expense_by_period(&state.db, period.sql_format()).await?;
    let totals = (db::total_income(&state.db).await?, db::total_expense(&state.db).await?);

    let rows_in: i64 = income.iter().map(|(_, v)| v).sum();
    let rows_out: i64 = expense.iter().map(|(_, v)| v).sum();
    if (rows_in, rows_out) != totals {
        tracing::warn!(
            filter = period.label(),
            rows_in,
            rows_out,
            total_in = totals.0,
            total_out = totals.1,
            "report rows disagree with unfiltered totals"
        );
    }
    Ok(build_report(period, &income, &expense, totals))
}

async fn ensure_report_access(state: &AppState, user: &AuthenticatedUser) -> ApiResult<()> {
    if user.is_admin() {
        return Ok(());
    }
    let allowed = db::get_user(&state.db, &user.id)
        .await?
        .map(|u| u.can_view_report)
        .unwrap_or(false);
    if !allowed {
        return Err(ApiError::Forbidden("Tidak memiliki akses laporan".to_string()));
    }
    Ok(())
}

fn parse_period(raw: Option<&str>) -> ApiResult<Period> {
    Period::parse(raw)
        .ok_or_else(|| FieldErrors::single("filter", "Filter harus harian, bulanan, atau tahunan"))
}

pub async fn financial_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<ReportParams>,
) -> ApiResult<impl IntoResponse> {
    ensure_report_access(&state, &user).await?;
    let period = parse_period(params.filter.as_deref())?;
    Ok(Json(load_report(&state, period).await?))
}

pub async fn project_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<impl IntoResponse> {
    ensure_report_access(&state, &user).await?;
    let projects = db::list_projects(&state.db).await?;
    let rows: Vec<_> = projects
        .iter()
        .map(|p| {
            json!({
                "id": p.project.id,
                "name": p.project.name,
                "target": p.project.target,
                "total_pengeluaran": p.total_expenses,
                "sisa_anggaran": p.remaining(),
                "persentase_terpakai": share(p.total_expenses, p.project.target),
            })
        })
        .collect();
    Ok(Json(json!({ "projects": rows })))
}

pub async fn export_report_csv(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<ReportParams>,
) -> ApiResult<impl IntoResponse> {
    let period = parse_period(params.filter.as_deref())?;
    let report = load_report(&state, period).await?;

    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(["periode", "total_pemasukan", "total_pengeluaran", "total_saldo"])
        .map_err(anyhow::Error::from)?;
    for row in &report.data {
        w.write_record([
            row.periode.clone(),
            row.total_pemasukan.to_string(),
            row.total_pengeluaran.to_string(),
            row.total_saldo.to_string(),
        ])
        .map_err(anyhow::Error::from)?;
    }
    w.write_record([
        "TOTAL".to_string(),
        report.ringkasan.total_pemasukan.to_string(),
        report.ringkasan.total_pengeluaran.to_string(),
        report.ringkasan.total_saldo.to_string(),
    ])
    .map_err(anyhow::Error::from)?;
    let body = w.into_inner().map_err(|e| anyhow::anyhow!("csv flush: {}", e))?;
    Ok(csv_response(body, "laporan-keuangan.csv"))
}
