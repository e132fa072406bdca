//! # Hermes Dispatch Server
//!
//! Standalone binary for the SLA-bounded task dispatcher.
//!
//! ## Usage
//!
//! ```bash
//! # Run with defaults (port 8081, 30s SLA)
//! cargo run --bin hermes-dispatchd
//!
//! # Override via environment
//! HERMES_HTTP_PORT=9081 HERMES_DISPATCHER_SLA_MS=10000 cargo run --bin hermes-dispatchd
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use hermes_dispatch::web::{app, AppState};
use hermes_dispatch::{Dispatcher, SyntheticProcessor, TaskTable};
use hermes_shared::config::HermesConfig;
use hermes_shared::logging;
use hermes_shared::metrics::DispatchMetrics;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    info!("Starting Hermes dispatch server...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = HermesConfig::load().map_err(|e| format!("Failed to load configuration: {e}"))?;

    let metrics = Arc::new(DispatchMetrics::new());
    let table = Arc::new(TaskTable::new());
    let dispatcher = Arc::new(Dispatcher::new(
        table.clone(),
        Arc::new(SyntheticProcessor),
        config.dispatcher.sla(),
        metrics.clone(),
    ));
    let state = AppState {
        dispatcher,
        table: table.clone(),
        metrics,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;

    info!(%addr, sla_ms = config.dispatcher.sla_ms, "Dispatch API listening");
    info!("   Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown signal received, waiting for in-flight tasks...");

    // In-flight processors are detached; give them the grace period to
    // reach a terminal status before the process exits.
    let deadline = tokio::time::Instant::now() + config.shutdown.grace();
    while table.processing_count() > 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let remaining = table.processing_count();
    if remaining > 0 {
        error!(
            remaining,
            grace_ms = config.shutdown.grace_ms,
            "Grace period elapsed with tasks still processing"
        );
    }

    info!("Dispatch server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
