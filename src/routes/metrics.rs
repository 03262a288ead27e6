use axum::http::StatusCode;

use crate::services::metrics;

/// GET /metrics: Prometheus scrape endpoint.
pub async fn metrics_handler() -> Result<String, StatusCode> {
    metrics::render().map_err(|e| {
        tracing::warn!("Metrics: encoding failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
