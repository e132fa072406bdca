//! # Chat Gateway
//!
//! The per-connection WebSocket driver and the axum surface around it.
//!
//! Each connection runs three cooperating tasks:
//!
//! - a **reader** (this task) that parses inbound frames and hands them to
//!   the router; a parse failure earns the client a system notice and the
//!   session stays open;
//! - a **writer** that drains the session's outbound FIFO to the socket in
//!   strict order;
//! - a **room pump**, replaced on every join, that forwards the current
//!   room's broadcast into the session queue and counts lag drops.
//!
//! Teardown (peer close, read/write error, or eviction by a newer login)
//! always leaves the current room (announcing the departure) before the
//! session is removed from the registry.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use hermes_shared::ids::epoch_millis;
use hermes_shared::metrics::{BusMetrics, BusMetricsSnapshot};
use hermes_shared::types::ChatMessage;

use crate::room::RoomRegistry;
use crate::router::{MessageRouter, RouteOutcome};
use crate::session::{Session, SessionRegistry};

/// Shared state handed to every connection.
#[derive(Clone)]
pub struct ChatState {
    pub sessions: Arc<SessionRegistry>,
    pub rooms: Arc<RoomRegistry>,
    pub router: Arc<MessageRouter>,
    pub metrics: Arc<BusMetrics>,
    /// Server-wide token; every session holds a child of it.
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for ChatState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatState").finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Health document exposed on `/api/health`.
#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    sessions: usize,
    rooms: usize,
    metrics: BusMetricsSnapshot,
}

/// Build the chat router.
pub fn app(state: ChatState) -> Router {
    Router::new()
        .route("/chat", get(chat_handler))
        .route("/api/health", get(health))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// User id from the query string, or an `anonymous-<epochMs>` fallback.
pub fn resolve_user_id(requested: Option<String>) -> String {
    requested
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| format!("anonymous-{}", epoch_millis()))
}

async fn chat_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    State(state): State<ChatState>,
) -> Response {
    let user_id = resolve_user_id(query.user_id);
    ws.on_upgrade(move |socket| drive_session(socket, user_id, state))
}

async fn health(State(state): State<ChatState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "UP",
        sessions: state.sessions.len(),
        rooms: state.rooms.room_count(),
        metrics: state.metrics.snapshot(),
    })
}

async fn drive_session(socket: WebSocket, user_id: String, state: ChatState) {
    let connection_id = Uuid::now_v7();
    let span = info_span!("chat_session", user_id = %user_id, connection_id = %connection_id);
    run_session(socket, user_id, state).instrument(span).await;
}

async fn run_session(socket: WebSocket, user_id: String, state: ChatState) {
    let (session, evicted) = state.sessions.create(&user_id, &state.shutdown);
    if let Some(old) = evicted {
        info!("Evicting superseded session");
        state.router.notify_superseded(&old);
        old.cancel();
    }
    state.router.welcome(&session);
    info!("Session open");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer: strict FIFO drain of the outbound queue. A write failure
    // cancels the session, which in turn wakes the reader below.
    let writer = {
        let session = session.clone();
        tokio::spawn(async move {
            while let Some(msg) = session.next_outbound().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(error = %err, "Dropping unserializable outbound frame");
                        continue;
                    }
                };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    debug!("Write failed, closing session");
                    session.cancel();
                    break;
                }
            }
            let _ = ws_tx.send(Message::Close(None)).await;
        })
    };

    let mut pump: Option<JoinHandle<()>> = None;
    loop {
        tokio::select! {
            _ = session.cancelled() => break,
            frame = ws_rx.next() => match frame {
                None => break,
                Some(Err(err)) => {
                    debug!(error = %err, "Read failed, closing session");
                    break;
                }
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ChatMessage>(text.as_str()) {
                        Ok(inbound) => {
                            if let RouteOutcome::Joined { room_id, subscription } =
                                state.router.route(&session, inbound)
                            {
                                if let Some(old_pump) = pump.take() {
                                    old_pump.abort();
                                }
                                pump = Some(spawn_room_pump(
                                    room_id,
                                    subscription,
                                    session.clone(),
                                    state.metrics.clone(),
                                ));
                            }
                        }
                        Err(err) => {
                            debug!(error = %err, "Malformed inbound frame");
                            state.router.system_to(&session, "malformed frame");
                        }
                    }
                }
                Some(Ok(Message::Close(_))) => break,
                // Ping/pong are answered by axum; anything else is ignored.
                Some(Ok(_)) => {}
            }
        }
    }

    session.cancel();
    if let Some(pump) = pump.take() {
        pump.abort();
    }
    // Departure presence goes out before the registry eviction.
    state.rooms.leave(&session);
    let removed = state.sessions.remove_if_current(&session);
    let _ = tokio::time::timeout(Duration::from_secs(1), writer).await;
    info!(superseded = !removed, "Session closed");
}

/// Forward a room subscription into the session's outbound queue until the
/// session ends or the pump is replaced by a newer join.
pub fn spawn_room_pump(
    room_id: String,
    subscription: tokio::sync::broadcast::Receiver<ChatMessage>,
    session: Arc<Session>,
    metrics: Arc<BusMetrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = BroadcastStream::new(subscription);
        loop {
            tokio::select! {
                _ = session.cancelled() => break,
                item = stream.next() => match item {
                    // Room destroyed; nothing more will arrive.
                    None => break,
                    Some(Ok(msg)) => session.push(msg),
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        metrics.record_room_drops(skipped);
                        warn!(room_id = %room_id, skipped, "Room subscriber lagged, dropped oldest");
                    }
                }
            }
        }
    })
}
