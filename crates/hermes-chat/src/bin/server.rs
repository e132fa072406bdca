//! # Hermes Chat Server
//!
//! Standalone binary for the room-based realtime message bus.
//!
//! ## Usage
//!
//! ```bash
//! # Run with defaults (port 8082)
//! cargo run --bin hermes-chatd
//!
//! # Override via environment
//! HERMES_CHAT_PORT=9082 HERMES_SESSION_BUFFER_SIZE=128 cargo run --bin hermes-chatd
//! ```
//!
//! Clients connect to `ws://host:port/chat?userId=<name>`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use hermes_chat::gateway::app;
use hermes_chat::{ChatState, MessageRouter, RoomRegistry, SessionRegistry};
use hermes_shared::config::HermesConfig;
use hermes_shared::ids::MessageIds;
use hermes_shared::logging;
use hermes_shared::metrics::BusMetrics;

/// Time given to session writers to flush the shutdown notice.
const SHUTDOWN_FLUSH: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    info!("Starting Hermes chat server...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config = HermesConfig::load().map_err(|e| format!("Failed to load configuration: {e}"))?;

    let metrics = Arc::new(BusMetrics::new());
    let ids = Arc::new(MessageIds::new());
    let sessions = Arc::new(SessionRegistry::new(
        config.session.buffer_size,
        metrics.clone(),
    ));
    let rooms = Arc::new(RoomRegistry::new(config.room.buffer_size, ids.clone()));
    let router = Arc::new(MessageRouter::new(
        sessions.clone(),
        rooms.clone(),
        ids,
        metrics.clone(),
    ));
    let state = ChatState {
        sessions,
        rooms,
        router,
        metrics,
        shutdown: CancellationToken::new(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.chat.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind {addr}: {e}"))?;

    info!(
        %addr,
        room_buffer = config.room.buffer_size,
        session_buffer = config.session.buffer_size,
        "Chat bus listening"
    );
    info!("   Press Ctrl+C to shutdown gracefully");

    let signal_state = state.clone();
    let shutdown = async move {
        shutdown_signal().await;
        info!("Shutdown signal received, notifying sessions...");
        signal_state.router.broadcast_system("server shutting down");
        tokio::time::sleep(SHUTDOWN_FLUSH).await;
        // Cancelling the server token cascades to every session.
        signal_state.shutdown.cancel();
    };

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Chat server shutdown complete");
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
