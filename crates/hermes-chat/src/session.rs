//! # Sessions
//!
//! One [`Session`] per connected client: a bounded outbound FIFO drained by
//! the connection's writer task, the client's current room, and a
//! cancellation token that tears the connection down from either side.
//!
//! The outbound queue uses drop-oldest overflow: a slow reader loses its
//! oldest undelivered frames (counted in the bus metrics) instead of
//! stalling producers or growing without bound.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use hermes_shared::metrics::BusMetrics;
use hermes_shared::types::ChatMessage;

/// A connected client.
pub struct Session {
    user_id: String,
    queue: Mutex<VecDeque<ChatMessage>>,
    notify: Notify,
    capacity: usize,
    cancel: CancellationToken,
    current_room: Mutex<Option<String>>,
    metrics: Arc<BusMetrics>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Session {
    fn new(
        user_id: String,
        capacity: usize,
        cancel: CancellationToken,
        metrics: Arc<BusMetrics>,
    ) -> Self {
        Self {
            user_id,
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            cancel,
            current_room: Mutex::new(None),
            metrics,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Enqueue an outbound frame. When the queue is full the oldest
    /// undelivered frame is evicted first (drop-oldest).
    pub fn push(&self, msg: ChatMessage) {
        {
            let mut queue = self.queue.lock();
            if queue.len() >= self.capacity {
                queue.pop_front();
                self.metrics.record_session_drop();
            }
            queue.push_back(msg);
        }
        self.notify.notify_one();
    }

    /// Next frame for the writer, in strict FIFO order. Returns `None` once
    /// the session is cancelled.
    pub async fn next_outbound(&self) -> Option<ChatMessage> {
        loop {
            if let Some(msg) = self.queue.lock().pop_front() {
                return Some(msg);
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return None,
                _ = self.notify.notified() => {}
            }
        }
    }

    pub fn current_room(&self) -> Option<String> {
        self.current_room.lock().clone()
    }

    /// Record the new room, returning the previous one.
    pub fn set_current_room(&self, room_id: &str) -> Option<String> {
        self.current_room.lock().replace(room_id.to_string())
    }

    /// Clear and return the current room. Idempotent, so racing teardown
    /// paths perform the room leave at most once.
    pub fn take_current_room(&self) -> Option<String> {
        self.current_room.lock().take()
    }

    /// Tear the session down: wakes the writer, the reader, and any room
    /// pump attached to this session.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn queued_len(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Registry of active sessions keyed by user id.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    capacity: usize,
    metrics: Arc<BusMetrics>,
}

impl SessionRegistry {
    /// `capacity` bounds each session's outbound FIFO.
    pub fn new(capacity: usize, metrics: Arc<BusMetrics>) -> Self {
        Self {
            sessions: DashMap::new(),
            capacity,
            metrics,
        }
    }

    /// Register a session for `user_id`. A second connect supersedes the
    /// first: the displaced session is returned so the caller can notify
    /// and cancel it.
    pub fn create(
        &self,
        user_id: &str,
        parent: &CancellationToken,
    ) -> (Arc<Session>, Option<Arc<Session>>) {
        let session = Arc::new(Session::new(
            user_id.to_string(),
            self.capacity,
            parent.child_token(),
            self.metrics.clone(),
        ));
        let evicted = self.sessions.insert(user_id.to_string(), session.clone());
        (session, evicted)
    }

    pub fn get(&self, user_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(user_id).map(|entry| entry.clone())
    }

    /// Deliver to a user's outbound queue. Returns whether a session was
    /// present to accept the frame; a missing user is a no-op.
    pub fn push_to_user(&self, user_id: &str, msg: ChatMessage) -> bool {
        match self.sessions.get(user_id) {
            Some(session) => {
                session.push(msg);
                true
            }
            None => false,
        }
    }

    /// Remove `session` from the registry, but only if it still owns the
    /// entry; a superseded session must not evict its replacement.
    pub fn remove_if_current(&self, session: &Arc<Session>) -> bool {
        self.sessions
            .remove_if(session.user_id(), |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    /// Visit every active session (weakly consistent iteration).
    pub fn for_each(&self, mut f: impl FnMut(&Arc<Session>)) {
        for entry in self.sessions.iter() {
            f(entry.value());
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_shared::types::MessageKind;

    fn registry(capacity: usize) -> SessionRegistry {
        SessionRegistry::new(capacity, Arc::new(BusMetrics::new()))
    }

    fn frame(content: &str) -> ChatMessage {
        ChatMessage::system(content)
    }

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let registry = registry(8);
        let root = CancellationToken::new();
        let (session, _) = registry.create("alice", &root);

        session.push(frame("one"));
        session.push(frame("two"));
        session.push(frame("three"));

        assert_eq!(session.next_outbound().await.expect("frame").content, "one");
        assert_eq!(session.next_outbound().await.expect("frame").content, "two");
        assert_eq!(
            session.next_outbound().await.expect("frame").content,
            "three"
        );
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest_and_counts() {
        let metrics = Arc::new(BusMetrics::new());
        let registry = SessionRegistry::new(2, metrics.clone());
        let root = CancellationToken::new();
        let (session, _) = registry.create("alice", &root);

        session.push(frame("one"));
        session.push(frame("two"));
        session.push(frame("three"));

        assert_eq!(session.queued_len(), 2);
        assert_eq!(metrics.snapshot().session_drop_count, 1);
        assert_eq!(session.next_outbound().await.expect("frame").content, "two");
        assert_eq!(
            session.next_outbound().await.expect("frame").content,
            "three"
        );
    }

    #[tokio::test]
    async fn test_cancel_wakes_writer_with_none() {
        let registry = registry(8);
        let root = CancellationToken::new();
        let (session, _) = registry.create("alice", &root);

        let waiter = {
            let session = session.clone();
            tokio::spawn(async move { session.next_outbound().await })
        };
        session.cancel();
        assert!(waiter.await.expect("task completes").is_none());
    }

    #[tokio::test]
    async fn test_second_connect_supersedes_first() {
        let registry = registry(8);
        let root = CancellationToken::new();

        let (first, none) = registry.create("alice", &root);
        assert!(none.is_none());
        let (second, evicted) = registry.create("alice", &root);

        let old = evicted.expect("first session displaced");
        assert!(Arc::ptr_eq(&old, &first));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        // The displaced session cannot remove its replacement.
        assert!(!registry.remove_if_current(&first));
        assert!(registry.get("alice").is_some());
        assert!(registry.remove_if_current(&second));
        assert!(registry.get("alice").is_none());
    }

    #[tokio::test]
    async fn test_push_to_absent_user_is_noop() {
        let registry = registry(8);
        assert!(!registry.push_to_user("ghost", frame("hello")));
    }

    #[tokio::test]
    async fn test_push_to_user_delivers() {
        let registry = registry(8);
        let root = CancellationToken::new();
        let (session, _) = registry.create("bob", &root);

        assert!(registry.push_to_user("bob", frame("hi bob")));
        let delivered = session.next_outbound().await.expect("frame");
        assert_eq!(delivered.kind, MessageKind::System);
        assert_eq!(delivered.content, "hi bob");
    }

    #[tokio::test]
    async fn test_current_room_take_is_idempotent() {
        let registry = registry(8);
        let root = CancellationToken::new();
        let (session, _) = registry.create("alice", &root);

        assert!(session.set_current_room("general").is_none());
        assert_eq!(session.set_current_room("dev").as_deref(), Some("general"));
        assert_eq!(session.take_current_room().as_deref(), Some("dev"));
        assert!(session.take_current_room().is_none());
    }

    #[tokio::test]
    async fn test_child_tokens_cancel_with_parent() {
        let registry = registry(8);
        let root = CancellationToken::new();
        let (a, _) = registry.create("alice", &root);
        let (b, _) = registry.create("bob", &root);

        root.cancel();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
    }
}
