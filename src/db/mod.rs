use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;

/// Connect to Postgres. The store key is the connection password and
/// overrides any password embedded in the URL.
pub async fn create_pool(
    database_url: &str,
    key: &str,
    max_connections: u32,
    timeout_seconds: u64,
) -> anyhow::Result<PgPool> {
    let options = PgConnectOptions::from_str(database_url)?.password(key);
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(timeout_seconds))
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Run the migrations embedded in ./migrations/
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
