//! Pre-flight checks for operator-supplied migration statements. Runs before
//! any store access; a rejected statement is never executed or logged.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{EngineError, EngineResult};

pub const MAX_MIGRATION_NAME_LEN: usize = 200;

lazy_static! {
    static ref FORBIDDEN: Vec<(Regex, &'static str)> = [
        (r"(?i)\bDROP\s+DATABASE\b", "DROP DATABASE is not allowed"),
        (
            r"(?i)\b(DROP\s+TABLE|TRUNCATE)(\s+TABLE)?(\s+IF\s+EXISTS)?\s+(public\.)?(businesses|migration_log|_sqlx_migrations)\b",
            "dropping or truncating engine tables is not allowed",
        ),
        (
            r"(?i)\bDELETE\s+FROM\s+(public\.)?migration_log\b",
            "the migration log is append-only",
        ),
        (
            r"(?i)\bUPDATE\s+(public\.)?migration_log\b",
            "the migration log is append-only",
        ),
        (
            r"(?i)\bALTER\s+TABLE\s+(IF\s+EXISTS\s+)?(public\.)?businesses\s+DROP\b",
            "dropping columns of the tenant directory is not allowed",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, reason)| match Regex::new(pattern) {
        Ok(re) => Some((re, reason)),
        Err(e) => {
            tracing::error!("invalid sql guard pattern {pattern}: {e}");
            None
        }
    })
    .collect();
}

pub fn check_migration_name(name: &str) -> EngineResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(EngineError::validation("migration name is required"));
    }
    if name.chars().count() > MAX_MIGRATION_NAME_LEN {
        return Err(EngineError::validation(format!(
            "migration name must be at most {MAX_MIGRATION_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn check_statement(sql: &str) -> EngineResult<()> {
    if sql.trim().is_empty() {
        return Err(EngineError::validation("statement is empty"));
    }
    if let Some((_, reason)) = FORBIDDEN.iter().find(|(re, _)| re.is_match(sql)) {
        return Err(EngineError::validation(*reason));
    }
    Ok(())
}

/// Both checks, name first.
pub fn check(name: &str, sql: &str) -> EngineResult<()> {
    check_migration_name(name)?;
    check_statement(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_ddl_passes() {
        for sql in [
            "ALTER TABLE {tenant}_musteriler ADD COLUMN IF NOT EXISTS vip BOOLEAN DEFAULT false",
            "CREATE INDEX IF NOT EXISTS idx_{tenant}_randevular_tarih ON {tenant}_randevular (tarih)",
            "UPDATE {tenant}_ayarlar SET ayar_degeri = 'tr' WHERE ayar_adi = 'dil'",
            "ALTER TABLE businesses ADD COLUMN plan VARCHAR(20)",
            "DROP TABLE IF EXISTS {tenant}_eski_rapor",
        ] {
            assert!(check_statement(sql).is_ok(), "{sql}");
        }
    }

    #[test]
    fn destructive_statements_are_rejected() {
        for sql in [
            "drop database randevu",
            "DROP TABLE businesses",
            "DROP TABLE IF EXISTS public.migration_log CASCADE",
            "truncate table migration_log",
            "TRUNCATE _sqlx_migrations",
            "DELETE FROM migration_log WHERE status = 'failure'",
            "update migration_log set status = 'success'",
            "ALTER TABLE businesses DROP COLUMN name",
        ] {
            assert!(
                matches!(check_statement(sql), Err(EngineError::Validation(_))),
                "{sql}"
            );
        }
    }

    #[test]
    fn similarly_named_tables_are_not_confused() {
        assert!(check_statement("DROP TABLE IF EXISTS businesses_archive").is_ok());
        assert!(check_statement("DELETE FROM migration_log_export").is_ok());
    }

    #[test]
    fn blank_inputs_are_rejected() {
        assert!(check_statement("   \n").is_err());
        assert!(check_migration_name("").is_err());
        assert!(check_migration_name("  ").is_err());
        assert!(check_migration_name(&"x".repeat(MAX_MIGRATION_NAME_LEN + 1)).is_err());
        assert!(check_migration_name(&"x".repeat(MAX_MIGRATION_NAME_LEN)).is_ok());
    }
}
