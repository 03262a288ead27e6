//! Tenant schema lifecycle: provision, decommission, inspect and repair the
//! per-tenant table set described by the template registry.
//!
//! Per-table problems are turned into [`TableOutcome`]s and logged; only an
//! unreachable store surfaces as an `Err`.

use std::sync::Arc;

use futures_util::{stream, StreamExt};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::{
    config::EngineConfig,
    db::{
        catalog::CatalogInspector,
        ident::TenantId,
        store::{SchemaStore, StoreResult},
        tenant::{SeedPlan, TableTemplate, TemplateRegistry},
    },
    error::{EngineError, EngineResult, StoreError},
    models::{
        migration_log::{MigrationLogEntry, MigrationType},
        tenant::{Business, RepairReport, TableOutcome, TableStatus, TenantHealth},
    },
    services::{locks::TenantLocks, metrics, migration_log::MigrationLog},
};

/// Column width of `businesses.name`.
pub const MAX_BUSINESS_NAME_LEN: usize = 200;

pub struct TenantService {
    pub(crate) store: Arc<dyn SchemaStore>,
    pub(crate) registry: Arc<TemplateRegistry>,
    pub(crate) catalog: CatalogInspector,
    pub(crate) log: MigrationLog,
    pub(crate) locks: TenantLocks,
    pub(crate) config: EngineConfig,
}

impl TenantService {
    pub fn new(
        store: Arc<dyn SchemaStore>,
        registry: Arc<TemplateRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog: CatalogInspector::new(store.clone()),
            log: MigrationLog::new(store.clone()),
            locks: TenantLocks::new(),
            store,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &CatalogInspector {
        &self.catalog
    }

    pub fn log(&self) -> &MigrationLog {
        &self.log
    }

    pub fn store(&self) -> &Arc<dyn SchemaStore> {
        &self.store
    }

    /// One store round trip bounded by the configured statement timeout.
    pub(crate) async fn exec(&self, sql: &str, binds: &[&str]) -> StoreResult<u64> {
        match tokio::time::timeout(self.config.statement_timeout, self.store.execute(sql, binds))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }

    /// `exec` plus wall-clock duration in milliseconds.
    pub(crate) async fn timed(&self, sql: &str, binds: &[&str]) -> (StoreResult<u64>, i64) {
        let started = Instant::now();
        let result = self.exec(sql, binds).await;
        (result, elapsed_ms(started))
    }

    // ── Directory ───────────────────────────────────────────────────────────

    /// Tenants in directory order. Rows whose id no longer sanitizes are skipped.
    pub async fn tenant_ids(&self) -> EngineResult<Vec<TenantId>> {
        let businesses = self.store.list_tenants().await?;
        Ok(businesses
            .iter()
            .filter_map(|b| match TenantId::new(&b.tenant_id) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("skipping directory entry {:?}: {e}", b.tenant_id);
                    None
                }
            })
            .collect())
    }

    pub async fn businesses(&self) -> EngineResult<Vec<Business>> {
        Ok(self.store.list_tenants().await?)
    }

    /// Register a new business and provision its tables.
    pub async fn onboard(
        &self,
        raw_id: &str,
        name: &str,
        operator: &str,
    ) -> EngineResult<(Business, Vec<TableOutcome>)> {
        let tenant = TenantId::parse_strict(raw_id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("business name is required"));
        }
        if name.chars().count() > MAX_BUSINESS_NAME_LEN {
            return Err(EngineError::validation(format!(
                "business name exceeds {MAX_BUSINESS_NAME_LEN} characters"
            )));
        }

        let business = self.store.register_tenant(tenant.as_str(), name).await?;
        let tables = self.create(&tenant, operator).await?;
        info!(
            "Onboarded tenant {tenant}: {}/{} tables created",
            tables.iter().filter(|t| t.is_ok()).count(),
            tables.len()
        );
        Ok((business, tables))
    }

    /// Drop every tenant table, then remove the directory entry.
    /// Returns the per-table outcomes and whether a directory entry existed.
    pub async fn decommission(
        &self,
        tenant: &TenantId,
        operator: &str,
    ) -> EngineResult<(Vec<TableOutcome>, bool)> {
        let tables = self.drop_tables(tenant, operator).await?;
        let removed = self.store.unregister_tenant(tenant.as_str()).await?;
        info!("Decommissioned tenant {tenant} (directory entry removed: {removed})");
        Ok((tables, removed))
    }

    // ── Lifecycle ───────────────────────────────────────────────────────────

    /// Create every template table, then seed default settings.
    pub async fn create(&self, tenant: &TenantId, operator: &str) -> EngineResult<Vec<TableOutcome>> {
        let _guard = self.locks.acquire(tenant).await;
        info!("Provisioning tenant {tenant}");

        let mut outcomes = Vec::with_capacity(self.registry.len());
        for template in self.registry.templates(tenant) {
            outcomes.push(self.create_table(tenant, &template, operator).await?);
        }

        if let Some(plan) = self.registry.seed_plan(tenant) {
            let settings_ok = outcomes.iter().any(|o| o.table == plan.table && o.is_ok());
            if settings_ok {
                self.seed_settings(tenant, &plan, operator).await?;
            } else {
                warn!("{}: settings table not created, skipping defaults", tenant);
            }
        }

        Ok(outcomes)
    }

    /// Unconditional `DROP TABLE IF EXISTS ... CASCADE` for every suffix.
    /// Safe to repeat and safe on a tenant that never existed.
    pub async fn drop_tables(
        &self,
        tenant: &TenantId,
        operator: &str,
    ) -> EngineResult<Vec<TableOutcome>> {
        let _guard = self.locks.acquire(tenant).await;
        info!("Dropping tables of tenant {tenant}");

        let mut outcomes = Vec::with_capacity(self.registry.len());
        for suffix in self.registry.suffixes() {
            let table = tenant.table(suffix);
            let sql = format!("DROP TABLE IF EXISTS {table} CASCADE");
            let (result, duration_ms) = self.timed(&sql, &[]).await;
            let outcome = self
                .settle(tenant, &format!("drop_{table}"), &sql, result, duration_ms, operator)
                .await?;
            outcomes.push(match outcome {
                Ok(()) => TableOutcome::ok(&table, suffix),
                Err(e) => TableOutcome::failed(&table, suffix, e.failure_kind(), e.to_string()),
            });
        }
        Ok(outcomes)
    }

    /// Live state of every expected table. Pure read, lock-free.
    pub async fn status(&self, tenant: &TenantId) -> Vec<TableStatus> {
        let mut tables = Vec::with_capacity(self.registry.len());
        for suffix in self.registry.suffixes() {
            tables.push(self.catalog.table_status(&tenant.table(suffix), suffix).await);
        }
        tables
    }

    /// Recreate only the tables that are missing. Existing tables are never
    /// touched.
    pub async fn repair(&self, tenant: &TenantId, operator: &str) -> EngineResult<RepairReport> {
        let _guard = self.locks.acquire(tenant).await;
        let started = Instant::now();

        // A failed catalog read shows up as "missing"; confirm before recreating.
        let mut missing: Vec<TableStatus> = Vec::new();
        let mut failures = Vec::new();
        for status in self.status(tenant).await.into_iter().filter(|t| !t.exists) {
            match self.store.table_exists(&status.table).await {
                Ok(false) => missing.push(status),
                Ok(true) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("{tenant}: cannot confirm {} is missing: {e}", status.table);
                    failures.push(TableOutcome::failed(
                        &status.table,
                        &status.suffix,
                        e.failure_kind(),
                        e.to_string(),
                    ));
                }
            }
        }

        if missing.is_empty() && failures.is_empty() {
            info!("Repair of {tenant}: nothing missing");
            self.log
                .record(MigrationLogEntry::success(
                    format!("repair_{tenant}"),
                    MigrationType::Tenant,
                    Some(tenant.as_str()),
                    operator,
                    elapsed_ms(started),
                ))
                .await;
            return Ok(RepairReport {
                repaired_count: 0,
                missing: Vec::new(),
                failures: Vec::new(),
            });
        }

        info!("Repair of {tenant}: {} table(s) missing", missing.len());
        let mut repaired_count = 0;
        for status in &missing {
            let Some(template) = self.registry.template_for(tenant, &status.suffix) else {
                continue;
            };
            let outcome = self.create_table(tenant, &template, operator).await?;
            if !outcome.is_ok() {
                failures.push(outcome);
                continue;
            }
            repaired_count += 1;
            if self.registry.settings_suffix() == Some(status.suffix.as_str()) {
                if let Some(plan) = self.registry.seed_plan(tenant) {
                    self.seed_settings(tenant, &plan, operator).await?;
                }
            }
        }

        Ok(RepairReport {
            repaired_count,
            missing: missing.into_iter().map(|t| t.table).collect(),
            failures,
        })
    }

    /// Health of every tenant in the directory. Refreshes the fleet gauges.
    pub async fn all_status(&self) -> EngineResult<Vec<TenantHealth>> {
        let tenants = self.tenant_ids().await?;
        let fleet: Vec<TenantHealth> = stream::iter(tenants)
            .map(|tenant| async move {
                let tables = self.status(&tenant).await;
                TenantHealth::from_statuses(tenant.as_str(), &tables)
            })
            .buffered(self.config.fanout_concurrency.max(1))
            .collect()
            .await;

        metrics::record_fleet(&fleet);
        Ok(fleet)
    }

    // ── Internals ───────────────────────────────────────────────────────────

    async fn create_table(
        &self,
        tenant: &TenantId,
        template: &TableTemplate,
        operator: &str,
    ) -> EngineResult<TableOutcome> {
        let (result, duration_ms) = self.timed(&template.definition, &[]).await;
        let outcome = self
            .settle(
                tenant,
                &format!("create_{}", template.name),
                &template.definition,
                result,
                duration_ms,
                operator,
            )
            .await?;
        Ok(match outcome {
            Ok(()) => TableOutcome::ok(&template.name, &template.suffix),
            Err(e) => {
                error!("{}: create {} failed: {e}", tenant, template.name);
                TableOutcome::failed(&template.name, &template.suffix, e.failure_kind(), e.to_string())
            }
        })
    }

    /// Insert default settings. Existing keys are left alone; one ledger
    /// entry covers the whole batch.
    async fn seed_settings(
        &self,
        tenant: &TenantId,
        plan: &SeedPlan<'_>,
        operator: &str,
    ) -> EngineResult<u64> {
        let started = Instant::now();
        let mut inserted = 0;
        let mut errors: Vec<(String, StoreError)> = Vec::new();

        for (key, value) in plan.rows {
            match self.exec(&plan.statement, &[key.as_str(), value.as_str()]).await {
                Ok(n) => inserted += n,
                Err(StoreError::Conflict(_)) => {}
                Err(e) if e.is_fatal() => {
                    errors.push((key.clone(), e.clone()));
                    self.record_seed(tenant, plan, &errors, started, operator).await;
                    return Err(e.into());
                }
                Err(e) => errors.push((key.clone(), e)),
            }
        }

        self.record_seed(tenant, plan, &errors, started, operator).await;
        info!("{}: seeded {} default setting(s)", tenant, inserted);
        Ok(inserted)
    }

    async fn record_seed(
        &self,
        tenant: &TenantId,
        plan: &SeedPlan<'_>,
        errors: &[(String, StoreError)],
        started: Instant,
        operator: &str,
    ) {
        let name = format!("seed_{}", plan.table);
        let duration_ms = elapsed_ms(started);
        let entry = match errors.first() {
            None => MigrationLogEntry::success(
                name,
                MigrationType::Tenant,
                Some(tenant.as_str()),
                operator,
                duration_ms,
            ),
            Some((_, first)) => {
                let message = errors
                    .iter()
                    .map(|(key, e)| format!("{key}: {e}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                MigrationLogEntry::failure(
                    name,
                    MigrationType::Tenant,
                    Some(tenant.as_str()),
                    operator,
                    duration_ms,
                    first.failure_kind(),
                    &message,
                )
            }
        };
        self.log.record(entry.with_statement(&plan.statement)).await;
    }

    /// Record a single statement's outcome in the ledger. The inner result
    /// is the per-table outcome; the outer one aborts on a fatal error.
    async fn settle(
        &self,
        tenant: &TenantId,
        migration_name: &str,
        sql: &str,
        result: StoreResult<u64>,
        duration_ms: i64,
        operator: &str,
    ) -> EngineResult<Result<(), StoreError>> {
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
        self.log.record(entry.with_statement(sql)).await;

        match result {
            Ok(_) => Ok(Ok(())),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => Ok(Err(e)),
        }
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
