mod api;
mod config;
mod engine;
mod error;
mod hub;
mod models;
mod observability;
mod presence;
mod rides;
mod state;
mod storage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::storage::memory::MemoryStorage;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    // Durable storage is an external collaborator; the in-memory
    // implementation backs standalone runs.
    let storage = Arc::new(MemoryStorage::new());
    let shared_state = Arc::new(state::AppState::new(&config, storage));

    tokio::spawn(engine::sweep::run_presence_sweep(shared_state.clone()));

    let app = api::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "dispatch server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
