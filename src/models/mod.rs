pub mod migration;
pub mod migration_log;
pub mod tenant;
