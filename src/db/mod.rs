pub mod catalog;
pub mod ident;
#[cfg(test)]
pub mod memory;
pub mod store;
pub mod tenant;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

/// One pool shared by request traffic and DDL; a long fan-out migration
/// competes with everything else for these connections.
pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_millis(config.db_acquire_timeout_ms))
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

/// Create the engine's own shared tables (tenant directory, migration log).
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
