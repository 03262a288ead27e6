use std::{sync::Arc, time::Duration};

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec,
};
use tracing::{info, warn};

use crate::{models::tenant::TenantHealth, services::tenant::TenantService};

lazy_static! {
    // ── Event counters (increment on each ledger entry) ─────────────────────
    pub static ref SCHEMA_OPERATIONS_COUNTER: CounterVec = register_counter_vec!(
        "schema_operations_total",
        "Schema-affecting statements by migration type and outcome",
        &["migration_type", "status"]
    ).unwrap();

    // ── Fleet health (refreshed by the sweep) ───────────────────────────────
    pub static ref TABLES_MISSING_GAUGE: GaugeVec = register_gauge_vec!(
        "tenant_tables_missing",
        "Expected tables absent from a tenant schema",
        &["tenant"]
    ).unwrap();

    pub static ref TENANTS_GAUGE: Gauge = register_gauge!(
        "tenants_total",
        "Tenants in the directory"
    ).unwrap();
}

/// Overwrites the fleet gauges with a fresh sweep.
pub fn record_fleet(fleet: &[TenantHealth]) {
    write_fleet(fleet, &TABLES_MISSING_GAUGE, &TENANTS_GAUGE);
}

fn write_fleet(fleet: &[TenantHealth], missing_gauge: &GaugeVec, tenants_gauge: &Gauge) {
    missing_gauge.reset();
    tenants_gauge.set(fleet.len() as f64);
    for tenant in fleet {
        let missing = tenant.tables_total.saturating_sub(tenant.tables_ok);
        missing_gauge
            .with_label_values(&[&tenant.tenant_id])
            .set(missing as f64);
    }
}

/// Spawn the background health sweep.
pub fn start(engine: Arc<TenantService>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            match engine.all_status().await {
                Ok(fleet) => {
                    let degraded = fleet.iter().filter(|t| !t.healthy).count();
                    info!(
                        "Metrics: swept {} tenant(s), {} not healthy",
                        fleet.len(),
                        degraded
                    );
                }
                Err(e) => warn!("Metrics: health sweep failed: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
    });
}

/// Prometheus text exposition of the default registry.
pub fn render() -> anyhow::Result<String> {
    use prometheus::{Encoder, TextEncoder};

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
