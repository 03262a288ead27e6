pub mod health;
pub mod metrics;
pub mod migrations;
pub mod tenants;

use axum::{
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{error::EngineError, AppState};

pub type ApiError = (StatusCode, Json<Value>);

pub fn engine_error(e: EngineError) -> ApiError {
    let status = match &e {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("{e}");
    }
    (status, Json(json!({ "error": e.to_string() })))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Tenant directory
        .route("/admin/businesses", get(tenants::list_businesses).post(tenants::create_business))
        .route("/admin/businesses/{id}", delete(tenants::delete_business))
        // Schema inspection & repair
        .route("/admin/db/tenants", get(tenants::fleet_status))
        .route("/admin/db/tenants/{id}/tables", get(tenants::tenant_tables))
        .route("/admin/db/tenants/{id}/tables/{suffix}/columns", get(tenants::table_columns))
        .route("/admin/db/tenants/{id}/repair", post(tenants::repair_tenant))
        .route("/admin/db/registry", get(tenants::registry))
        // Migrations
        .route("/admin/db/migrations", get(migrations::list_migrations))
        .route("/admin/db/migrations/custom", post(migrations::run_custom))
        .route("/admin/db/migrations/common", get(migrations::common_status))
        .route("/admin/db/migrations/common/up", post(migrations::common_up))
        .with_state(state)
}
