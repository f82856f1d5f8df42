use std::env;

fn main() -> anyhow::Result<()> {
    // Load .env if it exists
    dotenvy::dotenv().ok();

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://masjid.db?mode=rwc".to_string());
    println!("Starting database migration against {}...", database_url);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        // init_pool applies every pending migration before returning.
        let pool = masjid_donasi::db::init_pool(&database_url).await?;

        let applied: Vec<(i64, String)> =
            sqlx::query_as("SELECT version, description FROM _sqlx_migrations ORDER BY version")
                .fetch_all(&pool)
                .await?;
        for (version, description) in applied {
            println!("  applied {:04} {}", version, description);
        }

        pool.close().await;
        anyhow::Ok(())
    })?;

    println!("Migration complete.");
    Ok(())
}
