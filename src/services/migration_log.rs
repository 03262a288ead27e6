use std::sync::Arc;

use crate::{
    db::store::SchemaStore,
    error::EngineResult,
    models::migration_log::{LogPage, LogQuery, MigrationLogEntry},
    services::metrics,
};

/// Writer/reader for the append-only migration ledger.
#[derive(Clone)]
pub struct MigrationLog {
    store: Arc<dyn SchemaStore>,
}

impl MigrationLog {
    pub fn new(store: Arc<dyn SchemaStore>) -> Self {
        Self { store }
    }

    /// Append one entry. The write is awaited so entries for a tenant land in
    /// execution order, but a failed write never propagates: it is logged and
    /// reported as `false`.
    pub async fn record(&self, entry: MigrationLogEntry) -> bool {
        metrics::SCHEMA_OPERATIONS_COUNTER
            .with_label_values(&[entry.migration_type.as_str(), entry.status.as_str()])
            .inc();

        match self.store.append_log(&entry).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "migration log insert failed for {} ({}): {e}",
                    entry.migration_name,
                    entry.status.as_str()
                );
                false
            }
        }
    }

    pub async fn list(&self, query: &LogQuery) -> EngineResult<LogPage> {
        let (entries, total) = self.store.list_log(query).await?;
        Ok(LogPage {
            entries,
            total,
            page: query.page(),
            limit: query.limit(),
        })
    }
}
