//! # Id Generation and Wall Clock
//!
//! Process-local monotonic id generators. Uniqueness only needs to hold for
//! the lifetime of one process, so a relaxed atomic counter is sufficient;
//! there is no coordination with other processes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Epoch milliseconds, the timestamp unit used on every wire type.
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generator for dispatcher task ids of the form `task-N`.
#[derive(Debug)]
pub struct TaskIds {
    next: AtomicU64,
}

impl TaskIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Hand out the next task id. Ids are unique and strictly increasing
    /// in their numeric suffix.
    pub fn next(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("task-{n}")
    }
}

impl Default for TaskIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Generator for chat message ids. Every outbound frame carries one, and
/// per session they are observed strictly increasing.
#[derive(Debug)]
pub struct MessageIds {
    next: AtomicU64,
}

impl MessageIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MessageIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_task_ids_format_and_sequence() {
        let ids = TaskIds::new();
        assert_eq!(ids.next(), "task-1");
        assert_eq!(ids.next(), "task-2");
        assert_eq!(ids.next(), "task-3");
    }

    #[test]
    fn test_message_ids_strictly_increasing() {
        let ids = MessageIds::new();
        let a = ids.next();
        let b = ids.next();
        assert!(b > a);
    }

    #[test]
    fn test_task_ids_unique_across_threads() {
        let ids = Arc::new(TaskIds::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..100).map(|_| ids.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("worker thread panicked") {
                assert!(seen.insert(id), "duplicate task id handed out");
            }
        }
        assert_eq!(seen.len(), 800);
    }

    #[test]
    fn test_epoch_millis_is_recent() {
        // Any date after 2020 proves we are not returning seconds or zero.
        assert!(epoch_millis() > 1_577_836_800_000);
    }
}
