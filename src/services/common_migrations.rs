//! Shared-schema migrations kept as `*.sql` files in one directory.
//!
//! A file is applied when the ledger holds a successful `common` entry named
//! after its stem. Files run in name order; a failing file does not stop the
//! ones after it.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{info, warn};

use crate::{
    error::{EngineError, EngineResult},
    models::migration::{CommonMigrationFile, CommonMigrationResult},
    services::tenant::TenantService,
};

pub struct CommonMigrations {
    engine: Arc<TenantService>,
    dir: PathBuf,
}

impl CommonMigrations {
    pub fn new(engine: Arc<TenantService>, dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn status(&self) -> EngineResult<Vec<CommonMigrationFile>> {
        let files = self.files().await?;
        let applied = self.engine.store().successful_common_migrations().await?;
        Ok(files
            .into_iter()
            .map(|(file, migration_name)| CommonMigrationFile {
                applied: applied.contains(&migration_name),
                file,
                migration_name,
            })
            .collect())
    }

    /// Apply every pending file. Returns one result per attempted file.
    pub async fn up(&self, operator: &str) -> EngineResult<Vec<CommonMigrationResult>> {
        let pending: Vec<CommonMigrationFile> =
            self.status().await?.into_iter().filter(|f| !f.applied).collect();
        if pending.is_empty() {
            info!("Common migrations: nothing pending in {}", self.dir.display());
            return Ok(Vec::new());
        }

        info!("Common migrations: {} pending", pending.len());
        let mut results = Vec::with_capacity(pending.len());
        for file in pending {
            let sql = match tokio::fs::read_to_string(self.dir.join(&file.file)).await {
                Ok(sql) => sql,
                Err(e) => {
                    warn!("Common migrations: cannot read {}: {e}", file.file);
                    results.push(rejected(&file.migration_name, e.to_string()));
                    continue;
                }
            };

            match self
                .engine
                .run_common(&file.migration_name, &sql, operator)
                .await
            {
                Ok(result) => results.push(result),
                Err(EngineError::Validation(msg)) => {
                    warn!("Common migrations: {} rejected: {msg}", file.file);
                    results.push(rejected(&file.migration_name, msg));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// `(file name, migration name)` pairs, sorted by file name.
    async fn files(&self) -> EngineResult<Vec<(String, String)>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Common migrations directory {} not found", self.dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_error(&self.dir, e)),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let (Some(file), Some(stem)) = (
                path.file_name().and_then(|n| n.to_str()),
                path.file_stem().and_then(|n| n.to_str()),
            ) else {
                continue;
            };
            files.push((file.to_owned(), stem.to_owned()));
        }
        files.sort();
        Ok(files)
    }
}

fn rejected(migration_name: &str, error: String) -> CommonMigrationResult {
    CommonMigrationResult {
        migration_name: migration_name.to_owned(),
        success: false,
        error: Some(error),
        failure_kind: None,
        duration_ms: 0,
    }
}

fn io_error(dir: &Path, e: std::io::Error) -> EngineError {
    EngineError::Unavailable(format!("cannot read {}: {e}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::EngineConfig,
        db::{memory::MemoryStore, tenant::TemplateRegistry},
        error::StoreError,
    };

    fn setup(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<MemoryStore>, CommonMigrations) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(TenantService::new(
            store.clone(),
            Arc::new(TemplateRegistry::standard()),
            EngineConfig::default(),
        ));
        let migrations = CommonMigrations::new(engine, dir.path());
        (dir, store, migrations)
    }

    #[tokio::test]
    async fn status_lists_sql_files_in_order() {
        let (_dir, _store, migrations) = setup(&[
            ("002_paketler.sql", "CREATE TABLE IF NOT EXISTS paketler (id SERIAL)"),
            ("001_plan_column.sql", "ALTER TABLE businesses ADD COLUMN plan TEXT"),
            ("notes.txt", "not a migration"),
        ]);

        let status = migrations.status().await.unwrap();
        let names: Vec<_> = status.iter().map(|f| f.migration_name.as_str()).collect();
        assert_eq!(names, ["001_plan_column", "002_paketler"]);
        assert!(status.iter().all(|f| !f.applied));
    }

    #[tokio::test]
    async fn up_applies_pending_once() {
        let (_dir, store, migrations) = setup(&[
            ("001_plan_column.sql", "ALTER TABLE businesses ADD COLUMN plan TEXT"),
            ("002_paketler.sql", "CREATE TABLE IF NOT EXISTS paketler (id SERIAL)"),
        ]);

        let first = migrations.up("cli").await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|r| r.success));
        assert!(migrations.status().await.unwrap().iter().all(|f| f.applied));

        let second = migrations.up("cli").await.unwrap();
        assert!(second.is_empty());
        assert_eq!(store.executed().len(), 2);
    }

    #[tokio::test]
    async fn failing_file_does_not_stop_later_ones() {
        let (_dir, store, migrations) = setup(&[
            ("001_broken.sql", "ALTER TABLE nowhere ADD COLUMN x INT"),
            ("002_empty.sql", "   "),
            ("003_paketler.sql", "CREATE TABLE IF NOT EXISTS paketler (id SERIAL)"),
        ]);
        store.fail_when(
            "nowhere",
            StoreError::Statement("relation \"nowhere\" does not exist".into()),
        );

        let results = migrations.up("cli").await.unwrap();
        let outcome: Vec<_> = results
            .iter()
            .map(|r| (r.migration_name.as_str(), r.success))
            .collect();
        assert_eq!(
            outcome,
            [
                ("001_broken", false),
                ("002_empty", false),
                ("003_paketler", true)
            ]
        );

        // Failed files stay pending.
        let status = migrations.status().await.unwrap();
        let pending: Vec<_> = status
            .iter()
            .filter(|f| !f.applied)
            .map(|f| f.migration_name.as_str())
            .collect();
        assert_eq!(pending, ["001_broken", "002_empty"]);
    }

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(TenantService::new(
            store,
            Arc::new(TemplateRegistry::standard()),
            EngineConfig::default(),
        ));
        let migrations = CommonMigrations::new(engine, "/nonexistent/randevu/sql");
        assert!(migrations.status().await.unwrap().is_empty());
        assert!(migrations.up("cli").await.unwrap().is_empty());
    }
}
