//! # Service Metrics
//!
//! In-process counters for overflow and throughput. Overflow is never
//! surfaced to clients synchronously; these counters are the only place
//! drop-oldest evictions become visible, via the health endpoints.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters for the chat bus.
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// Broadcast messages a lagging room subscriber never saw.
    room_drop_count: AtomicU64,
    /// Messages evicted from a full session outbound queue.
    session_drop_count: AtomicU64,
    /// Inbound frames with a server-only type, dropped by the router.
    router_rejected: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_room_drops(&self, n: u64) {
        self.room_drop_count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_session_drop(&self) {
        self.session_drop_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_router_rejected(&self) {
        self.router_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            room_drop_count: self.room_drop_count.load(Ordering::Relaxed),
            session_drop_count: self.session_drop_count.load(Ordering::Relaxed),
            router_rejected: self.router_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`BusMetrics`], serialized on the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMetricsSnapshot {
    pub room_drop_count: u64,
    pub session_drop_count: u64,
    pub router_rejected: u64,
}

/// Counters for the dispatch service.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    /// Submissions that outlived the SLA and returned a handle.
    sla_timeouts: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sla_timeout(&self) {
        self.sla_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            sla_timeouts: self.sla_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`DispatchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchMetricsSnapshot {
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub sla_timeouts: u64,
}
