use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

use askpdf_backend::config::{AppPaths, Settings};
use askpdf_backend::logging;
use askpdf_backend::server;
use askpdf_backend::state::AppState;
use askpdf_backend::status::StatusConsumer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = AppPaths::new();
    logging::init(&paths, "askpdf-server.log");

    let settings = Settings::from_env()?;
    let state = AppState::initialize(settings, &paths).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = StatusConsumer::new(
        Arc::clone(&state.status_queue),
        state.status_cache.clone(),
        shutdown_rx,
    );
    let consumer_handle = tokio::spawn(consumer.run());

    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .unwrap_or(8000);
    let bind_addr = format!("0.0.0.0:{}", port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    let app: Router = server::router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the status consumer and let in-flight work finish.
    let _ = shutdown_tx.send(true);
    consumer_handle.await.context("status consumer panicked")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
    }
}
