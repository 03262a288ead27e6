//! Operator-supplied migrations: one tenant, every tenant, or the shared schema.

use futures_util::{stream, StreamExt, TryStreamExt};
use tracing::{error, info, warn};

use crate::{
    db::{ident::TenantId, tenant::substitute_tenant},
    error::EngineResult,
    models::{
        migration::{CommonMigrationResult, TenantMigrationResult},
        migration_log::{MigrationLogEntry, MigrationType},
    },
    services::{sql_guard, tenant::TenantService},
};

impl TenantService {
    /// Apply `statement` to one tenant, `{tenant}` (or `{isletme_id}`)
    /// replaced by its id.
    /// A failing statement is a result, not an error.
    pub async fn run_one(
        &self,
        tenant: &TenantId,
        migration_name: &str,
        statement: &str,
        operator: &str,
    ) -> EngineResult<TenantMigrationResult> {
        sql_guard::check(migration_name, statement)?;
        self.apply_to_tenant(tenant, migration_name.trim(), statement, operator)
            .await
    }

    /// `run_one` for every tenant in directory order. Up to
    /// `fanout_concurrency` tenants run at once; results keep directory order.
    pub async fn run_all(
        &self,
        migration_name: &str,
        statement: &str,
        operator: &str,
    ) -> EngineResult<Vec<TenantMigrationResult>> {
        sql_guard::check(migration_name, statement)?;
        let migration_name = migration_name.trim();
        let tenants = self.tenant_ids().await?;
        info!(
            "Fan-out migration {migration_name} over {} tenant(s)",
            tenants.len()
        );

        let results: Vec<TenantMigrationResult> = stream::iter(tenants)
            .map(|tenant| async move {
                self.apply_to_tenant(&tenant, migration_name, statement, operator)
                    .await
            })
            .buffered(self.config.fanout_concurrency.max(1))
            .try_collect()
            .await?;

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            warn!(
                "Fan-out migration {migration_name}: {failed}/{} tenant(s) failed",
                results.len()
            );
        }
        Ok(results)
    }

    /// Run `statement` once against the shared schema.
    pub async fn run_common(
        &self,
        migration_name: &str,
        statement: &str,
        operator: &str,
    ) -> EngineResult<CommonMigrationResult> {
        sql_guard::check(migration_name, statement)?;
        let migration_name = migration_name.trim();

        let (result, duration_ms) = self.timed(statement, &[]).await;
        let entry = match &result {
            Ok(_) => MigrationLogEntry::success(
                migration_name,
                MigrationType::Common,
                None,
                operator,
                duration_ms,
            ),
            Err(e) => MigrationLogEntry::failure(
                migration_name,
                MigrationType::Common,
                None,
                operator,
                duration_ms,
                e.failure_kind(),
                &e.to_string(),
            ),
        };
        self.log.record(entry.with_statement(statement)).await;

        match result {
            Ok(_) => {
                info!("Common migration {migration_name} applied in {duration_ms}ms");
                Ok(CommonMigrationResult {
                    migration_name: migration_name.to_owned(),
                    success: true,
                    error: None,
                    failure_kind: None,
                    duration_ms,
                })
            }
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                error!("Common migration {migration_name} failed: {e}");
                Ok(CommonMigrationResult {
                    migration_name: migration_name.to_owned(),
                    success: false,
                    error: Some(e.to_string()),
                    failure_kind: Some(e.failure_kind()),
                    duration_ms,
                })
            }
        }
    }

    async fn apply_to_tenant(
        &self,
        tenant: &TenantId,
        migration_name: &str,
        statement: &str,
        operator: &str,
    ) -> EngineResult<TenantMigrationResult> {
        let _guard = self.locks.acquire(tenant).await;
        let sql = substitute_tenant(statement, tenant);

        let (result, duration_ms) = self.timed(&sql, &[]).await;
        let entry = match &result {
            Ok(_) => MigrationLogEntry::success(
                migration_name,
                MigrationType::Tenant,
                Some(tenant.as_str()),
                operator,
                duration_ms,
            ),
            Err(e) => MigrationLogEntry::failure(
                migration_name,
                MigrationType::Tenant,
                Some(tenant.as_str()),
                operator,
                duration_ms,
                e.failure_kind(),
                &e.to_string(),
            ),
        };
        self.log.record(entry.with_statement(&sql)).await;

        match result {
            Ok(_) => Ok(TenantMigrationResult {
                tenant_id: tenant.to_string(),
                success: true,
                error: None,
                failure_kind: None,
                duration_ms,
            }),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                error!("{tenant}: migration {migration_name} failed: {e}");
                Ok(TenantMigrationResult {
                    tenant_id: tenant.to_string(),
                    success: false,
                    error: Some(e.to_string()),
                    failure_kind: Some(e.failure_kind()),
                    duration_ms,
                })
            }
        }
    }
}
