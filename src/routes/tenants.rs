use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    db::ident::TenantId,
    middleware::super_admin::SuperAdminAuth,
    models::tenant::CreateBusinessRequest,
    routes::{engine_error, ApiError},
    AppState,
};

// ─── Tenant directory ────────────────────────────────────────────────────────

pub async fn list_businesses(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
) -> Result<Json<Value>, ApiError> {
    let businesses = state.engine.businesses().await.map_err(engine_error)?;
    Ok(Json(json!({ "total": businesses.len(), "businesses": businesses })))
}

pub async fn create_business(
    State(state): State<AppState>,
    auth: SuperAdminAuth,
    Json(body): Json<CreateBusinessRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (business, tables) = state
        .engine
        .onboard(&body.tenant_id, &body.name, &auth.operator)
        .await
        .map_err(engine_error)?;

    let failed = tables.iter().filter(|t| !t.is_ok()).count();
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "business": business,
            "tables": tables,
            "tables_failed": failed,
        })),
    ))
}

pub async fn delete_business(
    State(state): State<AppState>,
    auth: SuperAdminAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let tenant = TenantId::new(&id).map_err(engine_error)?;
    let (tables, unregistered) = state
        .engine
        .decommission(&tenant, &auth.operator)
        .await
        .map_err(engine_error)?;
    Ok(Json(json!({
        "tenant_id": tenant,
        "unregistered": unregistered,
        "tables": tables,
    })))
}

// ─── Schema inspection & repair ──────────────────────────────────────────────

pub async fn fleet_status(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
) -> Result<Json<Value>, ApiError> {
    let fleet = state.engine.all_status().await.map_err(engine_error)?;
    let healthy = fleet.iter().filter(|t| t.healthy).count();
    Ok(Json(json!({
        "total": fleet.len(),
        "healthy": healthy,
        "tenants": fleet,
    })))
}

pub async fn tenant_tables(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let tenant = TenantId::new(&id).map_err(engine_error)?;
    let tables = state.engine.status(&tenant).await;
    let tables_ok = tables.iter().filter(|t| t.exists).count();
    Ok(Json(json!({
        "tenant_id": tenant,
        "tables_ok": tables_ok,
        "tables_total": tables.len(),
        "tables": tables,
    })))
}

pub async fn table_columns(
    State(state): State<AppState>,
    _auth: SuperAdminAuth,
    Path((id, suffix)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let tenant = TenantId::new(&id).map_err(engine_error)?;
    let template = state
        .engine
        .registry()
        .template_for(&tenant, &suffix)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("Unknown table suffix: {suffix}") })),
            )
        })?;

    let columns = state.engine.catalog().columns(&template.name).await;
    Ok(Json(json!({ "table": template.name, "columns": columns })))
}

pub async fn repair_tenant(
    State(state): State<AppState>,
    auth: SuperAdminAuth,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let tenant = TenantId::new(&id).map_err(engine_error)?;
    let report = state
        .engine
        .repair(&tenant, &auth.operator)
        .await
        .map_err(engine_error)?;
    Ok(Json(json!({ "tenant_id": tenant, "report": report })))
}

pub async fn registry(State(state): State<AppState>, _auth: SuperAdminAuth) -> Json<Value> {
    let registry = state.engine.registry();
    let templates: Vec<Value> = registry
        .suffixes()
        .map(|suffix| json!({ "suffix": suffix }))
        .collect();
    Json(json!({
        "version": registry.version(),
        "settings_table": registry.settings_suffix(),
        "templates": templates,
    }))
}
