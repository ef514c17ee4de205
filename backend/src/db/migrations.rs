use anyhow::Result;
use sqlx::PgPool;

/// Apply the embedded schema for profiles, connections and notifications.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database schema is up to date");
    Ok(())
}
