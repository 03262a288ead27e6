use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "migration_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MigrationType {
    /// Shared (non-tenant) schema.
    Common,
    Tenant,
}

impl MigrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Tenant => "tenant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "migration_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failure,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "failure_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Error,
    Timeout,
}

/// One row of the append-only migration ledger.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MigrationLogEntry {
    pub id: Uuid,
    pub migration_name: String,
    pub migration_type: MigrationType,
    pub target: Option<String>,
    pub status: LogStatus,
    pub failure_kind: Option<FailureKind>,
    pub statement_text: Option<String>,
    pub error_message: Option<String>,
    pub operator: String,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl MigrationLogEntry {
    pub fn success(
        migration_name: impl Into<String>,
        migration_type: MigrationType,
        target: Option<&str>,
        operator: &str,
        duration_ms: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            migration_name: migration_name.into(),
            migration_type,
            target: target.map(str::to_owned),
            status: LogStatus::Success,
            failure_kind: None,
            statement_text: None,
            error_message: None,
            operator: operator.to_owned(),
            duration_ms,
            created_at: Utc::now(),
        }
    }

    /// An empty message is replaced so that failure rows always explain themselves.
    pub fn failure(
        migration_name: impl Into<String>,
        migration_type: MigrationType,
        target: Option<&str>,
        operator: &str,
        duration_ms: i64,
        kind: FailureKind,
        error: &str,
    ) -> Self {
        let error = if error.trim().is_empty() {
            "unknown error".to_owned()
        } else {
            error.to_owned()
        };
        Self {
            status: LogStatus::Failure,
            failure_kind: Some(kind),
            error_message: Some(error),
            ..Self::success(migration_name, migration_type, target, operator, duration_ms)
        }
    }

    pub fn with_statement(mut self, statement: &str) -> Self {
        self.statement_text = Some(statement.to_owned());
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "type")]
    pub migration_type: Option<MigrationType>,
    pub target: Option<String>,
}

impl LogQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub entries: Vec<MigrationLogEntry>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_entry_never_has_empty_message() {
        let entry = MigrationLogEntry::failure(
            "create_acme_ayarlar",
            MigrationType::Tenant,
            Some("acme"),
            "system",
            3,
            FailureKind::Error,
            "   ",
        );
        assert_eq!(entry.status, LogStatus::Failure);
        assert_eq!(entry.error_message.as_deref(), Some("unknown error"));
        assert_eq!(entry.target.as_deref(), Some("acme"));
    }

    #[test]
    fn log_query_clamps_paging() {
        let q = LogQuery {
            page: Some(0),
            limit: Some(10_000),
            ..Default::default()
        };
        assert_eq!(q.page(), 1);
        assert_eq!(q.limit(), LogQuery::MAX_LIMIT);
        assert_eq!(q.offset(), 0);

        let q = LogQuery {
            page: Some(3),
            limit: Some(20),
            ..Default::default()
        };
        assert_eq!(q.offset(), 40);
    }

    #[test]
    fn offset_saturates_on_huge_pages() {
        let q = LogQuery {
            page: Some(i64::MAX),
            limit: Some(200),
            ..Default::default()
        };
        assert_eq!(q.offset(), i64::MAX);
        assert!(q.offset() >= 0);
    }
}
