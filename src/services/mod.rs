pub mod common_migrations;
pub mod locks;
pub mod metrics;
pub mod migration_log;
pub mod migrations;
pub mod sql_guard;
pub mod tenant;
