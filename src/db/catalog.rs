//! Read-only introspection. Never fails: a broken catalog query reports the
//! safe default so a health check is never the thing that errors.

use std::sync::Arc;

use crate::{
    db::store::SchemaStore,
    models::tenant::{ColumnInfo, TableStatus},
};

pub const EMPTY_SIZE: &str = "0 bytes";

#[derive(Clone)]
pub struct CatalogInspector {
    store: Arc<dyn SchemaStore>,
}

impl CatalogInspector {
    pub fn new(store: Arc<dyn SchemaStore>) -> Self {
        Self { store }
    }

    pub async fn exists(&self, table: &str) -> bool {
        self.store.table_exists(table).await.unwrap_or_else(|e| {
            tracing::warn!("catalog: existence check for {table} failed: {e}");
            false
        })
    }

    pub async fn row_count(&self, table: &str) -> i64 {
        self.store.row_count(table).await.unwrap_or_else(|e| {
            tracing::debug!("catalog: row count for {table} failed: {e}");
            0
        })
    }

    pub async fn size_on_disk(&self, table: &str) -> String {
        match self.store.total_size(table).await {
            Ok(Some(size)) => size,
            Ok(None) => EMPTY_SIZE.to_owned(),
            Err(e) => {
                tracing::debug!("catalog: size lookup for {table} failed: {e}");
                EMPTY_SIZE.to_owned()
            }
        }
    }

    pub async fn columns(&self, table: &str) -> Vec<ColumnInfo> {
        self.store.columns(table).await.unwrap_or_else(|e| {
            tracing::warn!("catalog: column lookup for {table} failed: {e}");
            Vec::new()
        })
    }

    /// Count and size are only queried for tables that exist.
    pub async fn table_status(&self, table: &str, suffix: &str) -> TableStatus {
        let exists = self.exists(table).await;
        let (rows, size) = if exists {
            (self.row_count(table).await, self.size_on_disk(table).await)
        } else {
            (0, EMPTY_SIZE.to_owned())
        };
        TableStatus {
            table: table.to_owned(),
            suffix: suffix.to_owned(),
            exists,
            rows,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;

    #[tokio::test]
    async fn reports_live_state() {
        let store = Arc::new(MemoryStore::new());
        store.create_table("acme_musteriler");
        store.insert_row("acme_musteriler", "a");
        store.insert_row("acme_musteriler", "b");
        let catalog = CatalogInspector::new(store.clone());

        let status = catalog.table_status("acme_musteriler", "musteriler").await;
        assert!(status.exists);
        assert_eq!(status.rows, 2);
        assert_ne!(status.size, EMPTY_SIZE);

        let missing = catalog.table_status("acme_faturalar", "faturalar").await;
        assert!(!missing.exists);
        assert_eq!(missing.rows, 0);
        assert_eq!(missing.size, EMPTY_SIZE);
    }

    #[tokio::test]
    async fn degrades_to_defaults_when_store_is_down() {
        let store = Arc::new(MemoryStore::new());
        store.create_table("acme_musteriler");
        store.set_unavailable(true);
        let catalog = CatalogInspector::new(store);

        assert!(!catalog.exists("acme_musteriler").await);
        assert_eq!(catalog.row_count("acme_musteriler").await, 0);
        assert_eq!(catalog.size_on_disk("acme_musteriler").await, EMPTY_SIZE);
        assert!(catalog.columns("acme_musteriler").await.is_empty());
    }

    #[tokio::test]
    async fn count_failure_on_existing_table_reports_zero() {
        let store = Arc::new(MemoryStore::new());
        store.create_table("acme_mesajlar");
        store.insert_row("acme_mesajlar", "x");
        store.break_row_counts();
        let catalog = CatalogInspector::new(store);

        let status = catalog.table_status("acme_mesajlar", "mesajlar").await;
        assert!(status.exists);
        assert_eq!(status.rows, 0);
    }
}
