use super::DbPool;

/// `strftime` pattern that buckets a timestamp into one report period.
pub type PeriodFormat = &'static str;

/// Sum of accepted donations per period, ascending.
pub async fn income_by_period(
    pool: &DbPool,
    format: PeriodFormat,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT strftime(?, created_at) AS period, SUM(amount) AS total
         FROM donations WHERE status = 'accepted'
         GROUP BY period ORDER BY period ASC",
    )
    .bind(format)
    .fetch_all(pool)
    .await
}

/// Sum of expenses per period, ascending.
pub async fn expense_by_period(
    pool: &DbPool,
    format: PeriodFormat,
) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT strftime(?, created_at) AS period, SUM(amount) AS total
         FROM expenses GROUP BY period ORDER BY period ASC",
    )
    .bind(format)
    .fetch_all(pool)
    .await
}

pub async fn total_income(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount), 0) FROM donations WHERE status = 'accepted'",
    )
    .fetch_one(pool)
    .await?;
    Ok(total)
}

pub async fn total_expense(pool: &DbPool) -> Result<i64, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM expenses")
        .fetch_one(pool)
        .await?;
    Ok(total)
}
