mod api;
mod config;
mod engine;
mod error;
mod geo;
mod models;
mod notify;
mod observability;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::models::tariff::Tariff;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let notifier = Arc::new(notify::LogNotifier);
    let (app_state, order_rx) = AppState::new(config.clone(), notifier);
    let shared_state = Arc::new(app_state);

    seed_tariffs(&shared_state);

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(engine::dispatch::run_dispatch_worker(
        shared_state.clone(),
        order_rx,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

/// Flat-rate bands for the Yogyakarta city center routes.
fn seed_tariffs(state: &AppState) {
    let bands = [
        ("Dekat", 0.0, 3.0, 10_000.0),
        ("Sedang", 3.0, 7.0, 20_000.0),
        ("Jauh", 7.0, 15.0, 30_000.0),
        ("Sangat Jauh", 15.0, 25.0, 40_000.0),
    ];

    for (id, (name, min, max, price)) in (1u64..).zip(bands) {
        state.tariffs.insert(
            id,
            Tariff {
                id,
                name: name.to_string(),
                min_distance_km: min,
                max_distance_km: max,
                price,
                is_active: true,
            },
        );
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
