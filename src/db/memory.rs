//! In-memory `SchemaStore` for tests. Understands just enough SQL to model
//! table creation, drops and keyed inserts; everything else is recorded and
//! reported as executed. Failures, delays and outages can be injected.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    db::store::{SchemaStore, StoreResult},
    error::StoreError,
    models::{
        migration_log::{LogQuery, LogStatus, MigrationLogEntry, MigrationType},
        tenant::{Business, ColumnInfo},
    },
};

#[derive(Default)]
struct State {
    tables: BTreeMap<String, BTreeSet<String>>,
    tenants: Vec<Business>,
    log: Vec<MigrationLogEntry>,
    executed: Vec<String>,
    failures: Vec<(String, StoreError)>,
    delays: Vec<(String, Duration)>,
    exists_failures: BTreeMap<String, usize>,
    unavailable: bool,
    log_broken: bool,
    counts_broken: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenants(ids: &[&str]) -> Self {
        let store = Self::new();
        for id in ids {
            store.add_tenant(id);
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn add_tenant(&self, id: &str) {
        self.lock().tenants.push(Business {
            tenant_id: id.to_owned(),
            name: id.to_owned(),
            is_active: true,
            created_at: Utc::now(),
        });
    }

    /// Any statement containing `needle` fails with `err`.
    pub fn fail_when(&self, needle: &str, err: StoreError) {
        self.lock().failures.push((needle.to_owned(), err));
    }

    /// Any statement containing `needle` sleeps for `delay` first.
    pub fn delay_when(&self, needle: &str, delay: Duration) {
        self.lock().delays.push((needle.to_owned(), delay));
    }

    /// The next `times` existence checks for `table` fail.
    pub fn fail_existence_checks(&self, table: &str, times: usize) {
        self.lock().exists_failures.insert(table.to_owned(), times);
    }

    pub fn set_unavailable(&self, down: bool) {
        self.lock().unavailable = down;
    }

    pub fn break_log(&self) {
        self.lock().log_broken = true;
    }

    pub fn break_row_counts(&self) {
        self.lock().counts_broken = true;
    }

    pub fn create_table(&self, table: &str) {
        self.lock().tables.entry(table.to_owned()).or_default();
    }

    /// Removes a table behind the engine's back.
    pub fn remove_table(&self, table: &str) {
        self.lock().tables.remove(table);
    }

    pub fn insert_row(&self, table: &str, key: &str) {
        if let Some(rows) = self.lock().tables.get_mut(table) {
            rows.insert(key.to_owned());
        }
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains_key(table)
    }

    pub fn rows(&self, table: &str) -> Vec<String> {
        self.lock()
            .tables
            .get(table)
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.lock().tables.keys().cloned().collect()
    }

    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    /// Oldest first.
    pub fn log_entries(&self) -> Vec<MigrationLogEntry> {
        self.lock().log.clone()
    }

    fn guard(&self) -> StoreResult<()> {
        if self.lock().unavailable {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

fn object_after<'a>(sql: &'a str, prefix: &str) -> Option<&'a str> {
    let head = sql.trim_start();
    if !head.get(..prefix.len())?.eq_ignore_ascii_case(prefix) {
        return None;
    }
    head[prefix.len()..]
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .next()
        .filter(|name| !name.is_empty())
}

#[async_trait]
impl SchemaStore for MemoryStore {
    async fn execute(&self, sql: &str, binds: &[&str]) -> StoreResult<u64> {
        self.guard()?;

        let delay = self
            .lock()
            .delays
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if let Some((_, err)) = state
            .failures
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
        {
            return Err(err.clone());
        }
        state.executed.push(sql.to_owned());

        if let Some(name) = object_after(sql, "CREATE TABLE IF NOT EXISTS") {
            state.tables.entry(name.to_owned()).or_default();
            return Ok(0);
        }
        if let Some(name) = object_after(sql, "DROP TABLE IF EXISTS") {
            state.tables.remove(name);
            return Ok(0);
        }
        if let Some(name) = object_after(sql, "INSERT INTO") {
            let rows = state.tables.get_mut(name).ok_or_else(|| {
                StoreError::Statement(format!("relation \"{name}\" does not exist"))
            })?;
            let key = binds.first().copied().unwrap_or_default();
            return Ok(u64::from(rows.insert(key.to_owned())));
        }
        Ok(0)
    }

    async fn table_exists(&self, table: &str) -> StoreResult<bool> {
        self.guard()?;
        let mut state = self.lock();
        if let Some(left) = state.exists_failures.get_mut(table) {
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::Statement(
                    "canceling statement due to conflict with recovery".into(),
                ));
            }
        }
        Ok(state.tables.contains_key(table))
    }

    async fn row_count(&self, table: &str) -> StoreResult<i64> {
        self.guard()?;
        let state = self.lock();
        if state.counts_broken {
            return Err(StoreError::Statement("permission denied".into()));
        }
        state
            .tables
            .get(table)
            .map(|rows| rows.len() as i64)
            .ok_or_else(|| StoreError::Statement(format!("relation \"{table}\" does not exist")))
    }

    async fn total_size(&self, table: &str) -> StoreResult<Option<String>> {
        self.guard()?;
        Ok(self
            .lock()
            .tables
            .get(table)
            .map(|rows| format!("{} kB", 8 + 8 * (rows.len() / 100))))
    }

    async fn columns(&self, table: &str) -> StoreResult<Vec<ColumnInfo>> {
        self.guard()?;
        let state = self.lock();
        if !state.tables.contains_key(table) {
            return Ok(Vec::new());
        }
        Ok(vec![ColumnInfo {
            column_name: "id".into(),
            data_type: "integer".into(),
            is_nullable: false,
            column_default: Some(format!("nextval('{table}_id_seq'::regclass)")),
            character_maximum_length: None,
        }])
    }

    async fn list_tenants(&self) -> StoreResult<Vec<Business>> {
        self.guard()?;
        Ok(self.lock().tenants.clone())
    }

    async fn register_tenant(&self, tenant_id: &str, name: &str) -> StoreResult<Business> {
        self.guard()?;
        let mut state = self.lock();
        if state.tenants.iter().any(|b| b.tenant_id == tenant_id) {
            return Err(StoreError::Conflict(format!(
                "duplicate key value violates unique constraint: {tenant_id}"
            )));
        }
        let business = Business {
            tenant_id: tenant_id.to_owned(),
            name: name.to_owned(),
            is_active: true,
            created_at: Utc::now(),
        };
        state.tenants.push(business.clone());
        Ok(business)
    }

    async fn unregister_tenant(&self, tenant_id: &str) -> StoreResult<bool> {
        self.guard()?;
        let mut state = self.lock();
        let before = state.tenants.len();
        state.tenants.retain(|b| b.tenant_id != tenant_id);
        Ok(state.tenants.len() != before)
    }

    async fn append_log(&self, entry: &MigrationLogEntry) -> StoreResult<()> {
        self.guard()?;
        let mut state = self.lock();
        if state.log_broken {
            return Err(StoreError::Statement("relation \"migration_log\" does not exist".into()));
        }
        state.log.push(entry.clone());
        Ok(())
    }

    async fn list_log(&self, query: &LogQuery) -> StoreResult<(Vec<MigrationLogEntry>, i64)> {
        self.guard()?;
        let state = self.lock();
        let matching: Vec<&MigrationLogEntry> = state
            .log
            .iter()
            .rev()
            .filter(|e| query.migration_type.map_or(true, |t| e.migration_type == t))
            .filter(|e| {
                query
                    .target
                    .as_deref()
                    .map_or(true, |t| e.target.as_deref() == Some(t))
            })
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn successful_common_migrations(&self) -> StoreResult<Vec<String>> {
        self.guard()?;
        Ok(self
            .lock()
            .log
            .iter()
            .filter(|e| e.migration_type == MigrationType::Common && e.status == LogStatus::Success)
            .map(|e| e.migration_name.clone())
            .collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.guard()
    }
}
