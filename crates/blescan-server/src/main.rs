//! # blescan-server
//!
//! HTTP server for the blescan BLE scanner.
//!
//! This binary provides:
//! - REST API for radio control, scan sessions and the result list
//! - A Server-Sent Events feed of row-level list changes
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development, simulated radio
//! BLESCAN__BLUETOOTH__BACKEND=mock cargo run --package blescan-server
//!
//! # Production
//! BLESCAN_ENV=production ./blescan-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use blescan_core::Config;
use blescan_server::state::AppState;
use blescan_server::{api, logging};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Instrument};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = logging::init(logging::LogMode::from_env())?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting blescan-server");

    let config_path = Config::default_path();
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    info!(
        path = %config_path.display(),
        backend = ?config.bluetooth.backend,
        "Configuration loaded"
    );

    let addr = config.server.bind_addr();
    let cors = cors_layer(&config.server.cors_allowed_origins);
    let state = Arc::new(
        AppState::from_config(config)
            .await?
            .with_config_path(config_path),
    );

    let app = api::create_router(Arc::clone(&state)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let shutdown = setup_signal_handlers();
    async {
        info!("Listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown.await;
            })
            .await
    }
    .instrument(logging::server_span(state.controller.backend_name(), addr))
    .await?;

    info!("Cleaning up...");
    if let Err(e) = state.controller.stop_scan().await {
        warn!(error = %e, "Failed to stop scan during shutdown");
    }

    info!("blescan-server shutdown complete");
    Ok(())
}

/// CORS for the configured origins; any origin when none are configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Setup signal handlers for graceful shutdown
fn setup_signal_handlers() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = tx.send(());
    });

    rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) =
        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

    tokio::select! {
        _ = sigint.recv() => {
            info!("Received SIGINT, initiating shutdown...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Received Ctrl+C, initiating shutdown...");
}
