use std::{sync::Arc, time::Duration};

use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use randevu_api::{
    config::Config,
    db::{self, store::PgStore, tenant::TemplateRegistry},
    routes,
    services::{common_migrations::CommonMigrations, metrics, tenant::TenantService},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let engine_config = config.engine();
    let store = Arc::new(PgStore::new(pool, engine_config.statement_timeout));
    let registry = Arc::new(TemplateRegistry::standard());
    info!(
        "Template registry v{} loaded ({} tables)",
        registry.version(),
        registry.len()
    );

    let engine = Arc::new(TenantService::new(store, registry, engine_config));
    let common = Arc::new(CommonMigrations::new(
        engine.clone(),
        config.common_migrations_dir.clone(),
    ));

    if config.health_sweep_interval_secs > 0 {
        metrics::start(
            engine.clone(),
            Duration::from_secs(config.health_sweep_interval_secs),
        );
    } else {
        info!("Fleet health sweep disabled");
    }

    let state = AppState {
        engine,
        common,
        config: config.clone(),
    };

    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    info!("randevu schema API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
