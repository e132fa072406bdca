//! # Message Router
//!
//! Interprets inbound frames by type, with the sender always overridden to
//! the connection's authenticated user id. Every outbound frame leaves
//! here (or the room registry) stamped with a monotonic id, a server
//! timestamp, and a server-set sender.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

use hermes_shared::ids::{epoch_millis, MessageIds};
use hermes_shared::metrics::BusMetrics;
use hermes_shared::types::{ChatMessage, MessageKind};

use crate::room::RoomRegistry;
use crate::session::{Session, SessionRegistry};

/// What the gateway needs to do after a frame was routed.
#[derive(Debug)]
pub enum RouteOutcome {
    /// Nothing beyond what the router already did.
    Handled,
    /// The session moved rooms; the gateway must repoint its room pump at
    /// this subscription.
    Joined {
        room_id: String,
        subscription: broadcast::Receiver<ChatMessage>,
    },
}

/// Classifies and dispatches inbound frames.
#[derive(Debug)]
pub struct MessageRouter {
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomRegistry>,
    ids: Arc<MessageIds>,
    metrics: Arc<BusMetrics>,
}

impl MessageRouter {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        rooms: Arc<RoomRegistry>,
        ids: Arc<MessageIds>,
        metrics: Arc<BusMetrics>,
    ) -> Self {
        Self {
            sessions,
            rooms,
            ids,
            metrics,
        }
    }

    /// Route one inbound frame on behalf of `session`.
    pub fn route(&self, session: &Arc<Session>, inbound: ChatMessage) -> RouteOutcome {
        match inbound.kind {
            MessageKind::JoinRoom => self.handle_join(session, &inbound.content),
            MessageKind::Chat => {
                self.handle_chat(session, inbound.content);
                RouteOutcome::Handled
            }
            MessageKind::Private => {
                self.handle_private(session, inbound.target.as_deref(), inbound.content);
                RouteOutcome::Handled
            }
            MessageKind::System | MessageKind::Presence => {
                // Server-only types; clients never originate these.
                self.metrics.record_router_rejected();
                debug!(user_id = %session.user_id(), kind = ?inbound.kind,
                    "Dropped client frame with server-only type");
                RouteOutcome::Handled
            }
        }
    }

    fn handle_join(&self, session: &Arc<Session>, room_id: &str) -> RouteOutcome {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            self.system_to(session, "Room id required");
            return RouteOutcome::Handled;
        }
        let subscription = self.rooms.join_or_move(session, room_id);
        self.system_to(session, format!("You joined room: {room_id}"));
        RouteOutcome::Joined {
            room_id: room_id.to_string(),
            subscription,
        }
    }

    fn handle_chat(&self, session: &Arc<Session>, content: String) {
        let Some(room_id) = session.current_room() else {
            self.system_to(session, "You must join a room first");
            return;
        };
        let msg = self.stamp(ChatMessage::outbound(
            MessageKind::Chat,
            session.user_id(),
            content,
        ));
        self.rooms.broadcast(&room_id, msg);
    }

    fn handle_private(&self, session: &Arc<Session>, target: Option<&str>, content: String) {
        let Some(target) = target.filter(|t| !t.is_empty()) else {
            self.system_to(session, "Private message requires a target");
            return;
        };
        let msg = self
            .stamp(ChatMessage::outbound(
                MessageKind::Private,
                session.user_id(),
                content,
            ))
            .with_target(target);
        if self.sessions.push_to_user(target, msg) {
            self.system_to(session, format!("Message delivered to {target}"));
        } else {
            self.system_to(session, format!("User {target} not found"));
        }
    }

    /// Push a stamped system notice to one session.
    pub fn system_to(&self, session: &Session, content: impl Into<String>) {
        session.push(self.stamp(ChatMessage::system(content)));
    }

    /// Welcome notice on handshake completion.
    pub fn welcome(&self, session: &Session) {
        self.system_to(session, format!("Welcome, {}!", session.user_id()));
    }

    /// Notice pushed to a session displaced by a newer connection for the
    /// same user id.
    pub fn notify_superseded(&self, session: &Session) {
        self.system_to(session, "Connection superseded by a newer login");
    }

    /// Push a system notice to every active session (shutdown broadcast).
    pub fn broadcast_system(&self, content: &str) {
        self.sessions.for_each(|session| {
            self.system_to(session, content);
        });
    }

    fn stamp(&self, msg: ChatMessage) -> ChatMessage {
        msg.stamped(self.ids.next(), epoch_millis())
    }
}
