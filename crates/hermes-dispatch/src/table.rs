//! # Task Table
//!
//! Concurrent registry of task records. Every entry is guarded by its
//! dashmap shard lock; status transitions are compare-and-set against
//! `Processing`, so a terminal status is sticky no matter how racy the
//! callers are.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use hermes_shared::ids::epoch_millis;
use hermes_shared::types::{ProcessingResult, TaskRecord, TaskStatus};
use hermes_shared::{HermesError, HermesResult};

/// Concurrent mapping from task id to [`TaskRecord`].
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: DashMap<String, TaskRecord>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly accepted record. Fails if the id is already taken,
    /// which would mean the id generator handed out a duplicate.
    pub fn insert_initial(&self, record: TaskRecord) -> HermesResult<()> {
        match self.tasks.entry(record.task_id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
            Entry::Occupied(_) => Err(HermesError::DuplicateTask {
                task_id: record.task_id,
            }),
        }
    }

    /// Transition `Processing -> Completed`. Returns the updated record, or
    /// `None` when the record is absent or already terminal.
    pub fn mark_completed(&self, task_id: &str, result: ProcessingResult) -> Option<TaskRecord> {
        let mut entry = self.tasks.get_mut(task_id)?;
        if entry.status != TaskStatus::Processing {
            return None;
        }
        entry.complete(result, epoch_millis());
        Some(entry.clone())
    }

    /// Transition `Processing -> Failed`. Same contract as
    /// [`mark_completed`](TaskTable::mark_completed).
    pub fn mark_failed(&self, task_id: &str, error_message: impl Into<String>) -> Option<TaskRecord> {
        let mut entry = self.tasks.get_mut(task_id)?;
        if entry.status != TaskStatus::Processing {
            return None;
        }
        entry.fail(error_message, epoch_millis());
        Some(entry.clone())
    }

    pub fn get(&self, task_id: &str) -> Option<TaskRecord> {
        self.tasks.get(task_id).map(|entry| entry.clone())
    }

    /// Retrieval with collection semantics: returns the record, and when it
    /// is `Completed` also removes it under the same entry lock. A client
    /// therefore sees a completed task exactly once, while `Processing` and
    /// `Failed` records stay pollable.
    pub fn get_and_maybe_remove(&self, task_id: &str) -> Option<TaskRecord> {
        match self.tasks.entry(task_id.to_string()) {
            Entry::Occupied(entry) => {
                if entry.get().status == TaskStatus::Completed {
                    Some(entry.remove())
                } else {
                    Some(entry.get().clone())
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Ids currently in the table. Weakly consistent: reflects a committed
    /// state at some point during the call.
    pub fn list_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of records still in `Processing`, used by health reporting
    /// and the shutdown grace loop.
    pub fn processing_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|entry| entry.status == TaskStatus::Processing)
            .count()
    }
}
