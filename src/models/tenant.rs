use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::migration_log::FailureKind;

/// A row of the shared tenant directory.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Business {
    pub tenant_id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBusinessRequest {
    pub tenant_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Ok,
    Failed,
}

/// Result of one DDL statement against one tenant table.
#[derive(Debug, Clone, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub suffix: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

impl TableOutcome {
    pub fn ok(table: &str, suffix: &str) -> Self {
        Self {
            table: table.to_owned(),
            suffix: suffix.to_owned(),
            status: OutcomeStatus::Ok,
            error: None,
            failure_kind: None,
        }
    }

    pub fn failed(table: &str, suffix: &str, kind: FailureKind, error: String) -> Self {
        Self {
            table: table.to_owned(),
            suffix: suffix.to_owned(),
            status: OutcomeStatus::Failed,
            error: Some(error),
            failure_kind: Some(kind),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }
}

/// Live state of one tenant table. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStatus {
    pub table: String,
    pub suffix: String,
    pub exists: bool,
    pub rows: i64,
    pub size: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub repaired_count: usize,
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<TableOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaState {
    NonExistent,
    Healthy,
    Degraded,
}

impl SchemaState {
    pub fn from_counts(tables_ok: usize, tables_total: usize) -> Self {
        if tables_ok == 0 && tables_total > 0 {
            Self::NonExistent
        } else if tables_ok == tables_total {
            Self::Healthy
        } else {
            Self::Degraded
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantHealth {
    pub tenant_id: String,
    pub tables_ok: usize,
    pub tables_total: usize,
    pub total_rows: i64,
    pub healthy: bool,
    pub state: SchemaState,
}

impl TenantHealth {
    pub fn from_statuses(tenant_id: &str, tables: &[TableStatus]) -> Self {
        let tables_ok = tables.iter().filter(|t| t.exists).count();
        let tables_total = tables.len();
        Self {
            tenant_id: tenant_id.to_owned(),
            tables_ok,
            tables_total,
            total_rows: tables.iter().map(|t| t.rows).sum(),
            healthy: tables_ok == tables_total,
            state: SchemaState::from_counts(tables_ok, tables_total),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub column_default: Option<String>,
    pub character_maximum_length: Option<i32>,
}
