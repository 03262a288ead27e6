//! The shared relational store as seen by the schema engine.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{Executor, PgPool};

use crate::{
    error::StoreError,
    models::{
        migration_log::{LogQuery, LogStatus, MigrationLogEntry, MigrationType},
        tenant::{Business, ColumnInfo},
    },
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Every store round trip the engine makes. Object names passed in here
/// come from `TenantId::table` and are already sanitized.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Runs one statement. With `binds`, `$1..$n` are bound as text.
    async fn execute(&self, sql: &str, binds: &[&str]) -> StoreResult<u64>;

    async fn table_exists(&self, table: &str) -> StoreResult<bool>;
    async fn row_count(&self, table: &str) -> StoreResult<i64>;
    /// Human readable total size, `None` when the relation does not exist.
    async fn total_size(&self, table: &str) -> StoreResult<Option<String>>;
    async fn columns(&self, table: &str) -> StoreResult<Vec<ColumnInfo>>;

    /// Tenant directory in insertion order.
    async fn list_tenants(&self) -> StoreResult<Vec<Business>>;
    async fn register_tenant(&self, tenant_id: &str, name: &str) -> StoreResult<Business>;
    async fn unregister_tenant(&self, tenant_id: &str) -> StoreResult<bool>;

    async fn append_log(&self, entry: &MigrationLogEntry) -> StoreResult<()>;
    /// Newest first, plus the total matching the filter.
    async fn list_log(&self, query: &LogQuery) -> StoreResult<(Vec<MigrationLogEntry>, i64)>;
    async fn successful_common_migrations(&self) -> StoreResult<Vec<String>>;

    async fn ping(&self) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    statement_timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }
}

#[async_trait]
impl SchemaStore for PgStore {
    async fn execute(&self, sql: &str, binds: &[&str]) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        // Server-side guard; the engine also bounds the call client-side.
        let set_timeout = format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout.as_millis()
        );
        (&mut *tx).execute(sqlx::raw_sql(&set_timeout)).await?;

        let affected = if binds.is_empty() {
            (&mut *tx).execute(sqlx::raw_sql(sql)).await?.rows_affected()
        } else {
            let mut query = sqlx::query(sql);
            for value in binds {
                query = query.bind(*value);
            }
            query.execute(&mut *tx).await?.rows_affected()
        };

        tx.commit().await?;
        Ok(affected)
    }

    async fn table_exists(&self, table: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
               SELECT 1 FROM information_schema.tables
               WHERE table_schema = current_schema() AND table_name = $1
             )",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn row_count(&self, table: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(r#"SELECT COUNT(*)::BIGINT FROM "{table}""#))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn total_size(&self, table: &str) -> StoreResult<Option<String>> {
        let size: Option<String> = sqlx::query_scalar(
            "SELECT pg_size_pretty(pg_total_relation_size(to_regclass($1)))",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(size)
    }

    async fn columns(&self, table: &str) -> StoreResult<Vec<ColumnInfo>> {
        let columns = sqlx::query_as::<_, ColumnInfo>(
            "SELECT column_name::TEXT              AS column_name,
                    data_type::TEXT                AS data_type,
                    (is_nullable = 'YES')          AS is_nullable,
                    column_default::TEXT           AS column_default,
                    character_maximum_length::INT4 AS character_maximum_length
             FROM information_schema.columns
             WHERE table_schema = current_schema() AND table_name = $1
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        Ok(columns)
    }

    async fn list_tenants(&self) -> StoreResult<Vec<Business>> {
        let rows = sqlx::query_as::<_, Business>(
            "SELECT tenant_id, name, is_active, created_at
             FROM businesses
             ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn register_tenant(&self, tenant_id: &str, name: &str) -> StoreResult<Business> {
        let row = sqlx::query_as::<_, Business>(
            "INSERT INTO businesses (tenant_id, name)
             VALUES ($1, $2)
             RETURNING tenant_id, name, is_active, created_at",
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn unregister_tenant(&self, tenant_id: &str) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM businesses WHERE tenant_id = $1")
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn append_log(&self, entry: &MigrationLogEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO migration_log
                (id, migration_name, migration_type, target, status, failure_kind,
                 statement_text, error_message, operator, duration_ms, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(entry.id)
        .bind(&entry.migration_name)
        .bind(entry.migration_type)
        .bind(&entry.target)
        .bind(entry.status)
        .bind(entry.failure_kind)
        .bind(&entry.statement_text)
        .bind(&entry.error_message)
        .bind(&entry.operator)
        .bind(entry.duration_ms)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_log(&self, query: &LogQuery) -> StoreResult<(Vec<MigrationLogEntry>, i64)> {
        let rows = sqlx::query_as::<_, MigrationLogEntry>(
            "SELECT id, migration_name, migration_type, target, status, failure_kind,
                    statement_text, error_message, operator, duration_ms, created_at
             FROM migration_log
             WHERE ($1::migration_type IS NULL OR migration_type = $1)
               AND ($2::TEXT IS NULL OR target = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4",
        )
        .bind(query.migration_type)
        .bind(&query.target)
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM migration_log
             WHERE ($1::migration_type IS NULL OR migration_type = $1)
               AND ($2::TEXT IS NULL OR target = $2)",
        )
        .bind(query.migration_type)
        .bind(&query.target)
        .fetch_one(&self.pool)
        .await?;

        Ok((rows, total))
    }

    async fn successful_common_migrations(&self) -> StoreResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT migration_name FROM migration_log
             WHERE migration_type = $1 AND status = $2",
        )
        .bind(MigrationType::Common)
        .bind(LogStatus::Success)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
