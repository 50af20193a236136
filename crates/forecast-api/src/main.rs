//! Forecast game API server entry point.

use std::sync::{Arc, Mutex};

use forecast_api::config::Config;
use forecast_api::error::AppError;
use forecast_api::routes;
use forecast_api::state::AppState;
use forecast_api::telemetry;
use forecast_core::clock::{Clock, SystemClock};
use forecast_core::rng::{DeterministicRng, SystemRng};
use forecast_generation::http_generator::HttpNarrativeGenerator;
use forecast_snapshot_store::MIGRATOR;
use forecast_snapshot_store::pg_snapshot_store::PgSnapshotStore;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;
    let _telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting forecast API server");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(SystemRng::new()));
    let app_state = AppState::new(
        clock,
        rng,
        Arc::new(PgSnapshotStore::new(pool)),
        Arc::new(HttpNarrativeGenerator::new(config.generator_url.clone())),
        config.fragment_buffer,
        config.poll_policy,
    );

    let app = routes::router(app_state);

    let addr = config.socket_addr()?;
    tracing::info!(%addr, generator = %config.generator_url, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
