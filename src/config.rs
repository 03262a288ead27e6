use std::{env, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub super_admin_key: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout_ms: u64,
    pub statement_timeout_ms: u64,
    /// Number of tenants migrated at once by a fleet migration. 1 keeps the sweep sequential.
    pub fanout_concurrency: usize,
    pub common_migrations_dir: String,
    /// 0 disables the background fleet health sweep.
    pub health_sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            super_admin_key: env::var("SUPER_ADMIN_KEY")
                .unwrap_or_else(|_| "change_this_super_admin_key".into()),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".into())
                .parse()?,
            db_acquire_timeout_ms: env::var("DB_ACQUIRE_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".into())
                .parse()?,
            statement_timeout_ms: env::var("STATEMENT_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".into())
                .parse()?,
            fanout_concurrency: env::var("FANOUT_CONCURRENCY")
                .unwrap_or_else(|_| "1".into())
                .parse::<usize>()?
                .max(1),
            common_migrations_dir: env::var("COMMON_MIGRATIONS_DIR")
                .unwrap_or_else(|_| "./sql/common".into()),
            health_sweep_interval_secs: env::var("HEALTH_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".into())
                .parse()?,
        })
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            statement_timeout: Duration::from_millis(self.statement_timeout_ms),
            fanout_concurrency: self.fanout_concurrency.max(1),
        }
    }
}

/// Knobs the schema engine needs at run time, split out of [`Config`] so the
/// engine can be built without a full environment.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub statement_timeout: Duration,
    pub fanout_concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            statement_timeout: Duration::from_secs(30),
            fanout_concurrency: 1,
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
