use serde::{Deserialize, Serialize};

use crate::models::migration_log::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationTarget {
    /// A single tenant, named by `tenant_id`.
    One,
    /// Every tenant in the directory.
    All,
    /// The shared schema, once.
    Common,
}

#[derive(Debug, Deserialize)]
pub struct RunMigrationRequest {
    pub migration_name: String,
    pub statement: String,
    pub target: MigrationTarget,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantMigrationResult {
    pub tenant_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommonMigrationResult {
    pub migration_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    pub duration_ms: i64,
}

/// Applied/pending state of one file in the common migrations directory.
#[derive(Debug, Clone, Serialize)]
pub struct CommonMigrationFile {
    pub file: String,
    pub migration_name: String,
    pub applied: bool,
}
