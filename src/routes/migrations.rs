use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    db::ident::TenantId,
    error::EngineError,
    middleware::super_admin::SuperAdminAuth,
    models::{
        migration::{MigrationTarget, RunMigrationRequest},
        migration_log::LogQuery,
    },
    routes::{engine_error, ApiError},
    AppState,
};

/// Newest first, paged.
pub async fn list_migrations(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Query(params): Query<LogQuery>,
) -> Result<Json<Value>, ApiError> {
    let page = state.engine.log().list(&params).await.map_err(engine_error)?;
    Ok(Json(json!(page)))
}

pub async fn run_custom(
    State(state): State<AppState>,
    auth: SuperAdminAuth,
    Json(body): Json<RunMigrationRequest>,
) -> Result<Json<Value>, ApiError> {
    let engine = &state.engine;
    match body.target {
        MigrationTarget::One => {
            let raw = body.tenant_id.as_deref().ok_or_else(|| {
                engine_error(EngineError::validation("tenant_id is required for target \"one\""))
            })?;
            let tenant = TenantId::new(raw).map_err(engine_error)?;
            let result = engine
                .run_one(&tenant, &body.migration_name, &body.statement, &auth.operator)
                .await
                .map_err(engine_error)?;
            Ok(Json(json!({ "target": "one", "result": result })))
        }
        MigrationTarget::All => {
            let results = engine
                .run_all(&body.migration_name, &body.statement, &auth.operator)
                .await
                .map_err(engine_error)?;
            let succeeded = results.iter().filter(|r| r.success).count();
            Ok(Json(json!({
                "target": "all",
                "total": results.len(),
                "succeeded": succeeded,
                "failed": results.len() - succeeded,
                "results": results,
            })))
        }
        MigrationTarget::Common => {
            let result = engine
                .run_common(&body.migration_name, &body.statement, &auth.operator)
                .await
                .map_err(engine_error)?;
            Ok(Json(json!({ "target": "common", "result": result })))
        }
    }
}

pub async fn common_status(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
) -> Result<Json<Value>, ApiError> {
    let files = state.common.status().await.map_err(engine_error)?;
    let pending = files.iter().filter(|f| !f.applied).count();
    Ok(Json(json!({ "pending": pending, "files": files })))
}

pub async fn common_up(
    State(state): State<AppState>,
    auth: SuperAdminAuth,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let results = state.common.up(&auth.operator).await.map_err(engine_error)?;
    let failed = results.iter().filter(|r| !r.success).count();
    Ok((
        StatusCode::OK,
        Json(json!({ "applied": results.len() - failed, "failed": failed, "results": results })),
    ))
}
