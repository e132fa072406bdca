//! # Rooms
//!
//! Room membership and per-room broadcast fan-out. Each room owns a
//! bounded `tokio::sync::broadcast` channel: every subscriber gets its own
//! cursor, and a subscriber that falls more than the buffer behind loses
//! its oldest undelivered messages (the lag is counted by the gateway).
//!
//! Rooms are created lazily on first join and removed together with the
//! last leave, under the same dashmap entry lock.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use hermes_shared::ids::{epoch_millis, MessageIds};
use hermes_shared::types::ChatMessage;

use crate::session::Session;

/// Membership plus the fan-out channel for one room.
#[derive(Debug)]
pub struct Room {
    members: HashSet<String>,
    broadcast_tx: broadcast::Sender<ChatMessage>,
}

impl Room {
    fn new(buffer_size: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(buffer_size);
        Self {
            members: HashSet::new(),
            broadcast_tx,
        }
    }
}

/// Concurrent mapping from room id to [`Room`].
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: DashMap<String, Room>,
    buffer_size: usize,
    ids: Arc<MessageIds>,
}

impl RoomRegistry {
    /// `buffer_size` bounds each room's broadcast buffer.
    pub fn new(buffer_size: usize, ids: Arc<MessageIds>) -> Self {
        Self {
            rooms: DashMap::new(),
            buffer_size,
            ids,
        }
    }

    /// Move `session` into `room_id`: leave the current room (announcing
    /// the departure there), join the new one (announcing the arrival),
    /// and return a fresh subscription to the new room's broadcast.
    ///
    /// The subscription is taken before the arrival announcement, so the
    /// joiner observes its own `joined` presence and everything after it.
    pub fn join_or_move(
        &self,
        session: &Session,
        room_id: &str,
    ) -> broadcast::Receiver<ChatMessage> {
        let user_id = session.user_id();
        if let Some(previous) = session.set_current_room(room_id) {
            if previous != room_id {
                self.remove_member(&previous, user_id);
            }
        }

        let mut entry = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(self.buffer_size));
        entry.members.insert(user_id.to_string());
        let subscription = entry.broadcast_tx.subscribe();
        let joined = ChatMessage::presence(format!("{user_id} joined the room"))
            .stamped(self.ids.next(), epoch_millis());
        // No receivers means nobody to tell, which is fine.
        let _ = entry.broadcast_tx.send(joined);
        debug!(user_id = %user_id, room_id = %room_id, "Joined room");
        subscription
    }

    /// Remove `session` from its current room, if any, announcing the
    /// departure there. Safe to call from racing teardown paths.
    pub fn leave(&self, session: &Session) {
        if let Some(room_id) = session.take_current_room() {
            self.remove_member(&room_id, session.user_id());
        }
    }

    /// Fan a message out to a room. A missing room or an empty audience is
    /// a no-op.
    pub fn broadcast(&self, room_id: &str, msg: ChatMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.broadcast_tx.send(msg);
        }
    }

    /// Subscribe to a room's fan-out without joining it.
    pub fn subscribe(&self, room_id: &str) -> Option<broadcast::Receiver<ChatMessage>> {
        self.rooms.get(room_id).map(|room| room.broadcast_tx.subscribe())
    }

    pub fn members(&self, room_id: &str) -> Option<Vec<String>> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.iter().cloned().collect())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_member(&self, room_id: &str, user_id: &str) {
        if let Entry::Occupied(mut occupied) = self.rooms.entry(room_id.to_string()) {
            let room = occupied.get_mut();
            if room.members.remove(user_id) {
                let left = ChatMessage::presence(format!("{user_id} left the room"))
                    .stamped(self.ids.next(), epoch_millis());
                let _ = room.broadcast_tx.send(left);
                debug!(user_id = %user_id, room_id = %room_id, "Left room");
            }
            // Last leave destroys the room, atomically under the entry lock.
            if room.members.is_empty() {
                occupied.remove();
            }
        }
    }
}
