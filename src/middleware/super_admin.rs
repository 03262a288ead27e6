use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::AppState;

pub const DEFAULT_OPERATOR: &str = "admin";
const MAX_OPERATOR_LEN: usize = 100;

/// Extractor that validates the `X-Super-Admin-Key` header against `config.super_admin_key`.
///
/// Carries the operator name recorded in the migration log, taken from the
/// optional `X-Operator` header.
pub struct SuperAdminAuth {
    pub operator: String,
}

impl FromRequestParts<AppState> for SuperAdminAuth {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("X-Super-Admin-Key")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing X-Super-Admin-Key header"))?;

        if key != state.config.super_admin_key {
            return Err((StatusCode::UNAUTHORIZED, "Invalid super-admin key"));
        }

        let operator = parts
            .headers
            .get("X-Operator")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.chars().take(MAX_OPERATOR_LEN).collect())
            .unwrap_or_else(|| DEFAULT_OPERATOR.to_owned());

        Ok(SuperAdminAuth { operator })
    }
}
