//! Chat bus wire type: one JSON envelope in both directions.
//!
//! Inbound frames from clients carry only `type`, `content`, and optionally
//! `target`; the server overwrites `sender` with the authenticated user id
//! and assigns `id` and `timestamp` on every outbound frame.

use serde::{Deserialize, Serialize};

/// Sender name stamped on server-originated frames.
pub const SYSTEM_SENDER: &str = "system";

/// Message classification. Clients may originate only `chat`, `private`,
/// and `join_room`; the rest are server-originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    Private,
    JoinRoom,
    System,
    Presence,
}

impl MessageKind {
    /// Whether clients are allowed to send this kind inbound.
    pub fn is_client_originated(self) -> bool {
        matches!(self, Self::Chat | Self::Private | Self::JoinRoom)
    }
}

/// The wire envelope for every chat frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Server-assigned, strictly increasing. Absent on inbound frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub sender: String,
    /// Required iff `kind` is `private`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Room id for `join_room`, message body for `chat`/`private`,
    /// human-readable note for `system`/`presence`.
    #[serde(default)]
    pub content: String,
    /// Server-assigned epoch milliseconds. Absent on inbound frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ChatMessage {
    /// An outbound frame awaiting id/timestamp assignment by the router.
    pub fn outbound(kind: MessageKind, sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            sender: sender.into(),
            target: None,
            content: content.into(),
            timestamp: None,
        }
    }

    /// A system notice addressed to whoever it is pushed to.
    pub fn system(content: impl Into<String>) -> Self {
        Self::outbound(MessageKind::System, SYSTEM_SENDER, content)
    }

    /// A room-scoped presence announcement.
    pub fn presence(content: impl Into<String>) -> Self {
        Self::outbound(MessageKind::Presence, SYSTEM_SENDER, content)
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Stamp the server-assigned fields onto an outbound frame.
    pub fn stamped(mut self, id: u64, timestamp: i64) -> Self {
        self.id = Some(id);
        self.timestamp = Some(timestamp);
        self
    }
}
