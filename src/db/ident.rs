//! Tenant identifiers and the only path from raw input to schema object names.

use std::fmt;

use serde::Serialize;

use crate::error::{EngineError, EngineResult};

pub const MIN_TENANT_ID_LEN: usize = 3;
pub const MAX_TENANT_ID_LEN: usize = 50;

/// Strips everything outside `[A-Za-z0-9_]` and lower-cases the rest.
/// Idempotent: `sanitize(&sanitize(s)) == sanitize(s)`.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn is_canonical(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// A sanitized tenant identifier. Safe to interpolate into object names.
///
/// Cannot be built from a raw string except through [`TenantId::new`] or
/// [`TenantId::parse_strict`], and deliberately has no `Deserialize`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Sanitizes `raw`; rejects ids that sanitize to nothing or exceed the length bound.
    pub fn new(raw: &str) -> EngineResult<Self> {
        let id = sanitize(raw);
        if id.is_empty() {
            return Err(EngineError::validation(format!(
                "tenant id {raw:?} contains no usable characters"
            )));
        }
        if id.len() > MAX_TENANT_ID_LEN {
            return Err(EngineError::validation(format!(
                "tenant id must be at most {MAX_TENANT_ID_LEN} characters"
            )));
        }
        Ok(Self(id))
    }

    /// Onboarding form: `raw` must already be `[a-z0-9_]{3,50}`.
    pub fn parse_strict(raw: &str) -> EngineResult<Self> {
        let len = raw.len();
        if !(MIN_TENANT_ID_LEN..=MAX_TENANT_ID_LEN).contains(&len) {
            return Err(EngineError::validation(format!(
                "tenant id must be {MIN_TENANT_ID_LEN}-{MAX_TENANT_ID_LEN} characters"
            )));
        }
        if !is_canonical(raw) {
            return Err(EngineError::validation(
                "tenant id may only contain lowercase letters, digits and underscore",
            ));
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<tenant>_<suffix>`. The suffix is sanitized as well, so a template
    /// registry cannot smuggle anything into the name either.
    pub fn table(&self, suffix: &str) -> String {
        format!("{}_{}", self.0, sanitize(suffix))
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
