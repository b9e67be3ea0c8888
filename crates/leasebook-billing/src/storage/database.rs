use crate::config::DatabaseConfig;
use crate::error::{BillingError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Open the Postgres pool described by `config`
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .connect(&config.url)
        .await
        .map_err(|e| BillingError::store("connect", e))?;

    info!(
        "Connected to ledger database (max {} connections)",
        config.max_connections
    );
    Ok(pool)
}

/// Apply the bundled schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| BillingError::store("run_migrations", e))?;

    info!("Database migrations completed successfully");
    Ok(())
}
