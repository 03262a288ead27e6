// Library exports for binary tools and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use services::{common_migrations::CommonMigrations, tenant::TenantService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TenantService>,
    pub common: Arc<CommonMigrations>,
    pub config: Arc<Config>,
}
