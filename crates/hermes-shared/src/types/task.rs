//! Task dispatch wire types: the processing request, its result, and the
//! pollable task record.

use serde::{Deserialize, Serialize};

/// Lowest accepted complexity; smaller ingress values are raised to this.
pub const MIN_COMPLEXITY: u8 = 1;
/// Highest accepted complexity; larger ingress values are lowered to this.
pub const MAX_COMPLEXITY: u8 = 10;

/// Fixed success message carried on every completed result.
pub const RESULT_MESSAGE: &str = "Data processed successfully";

/// A unit of synthetic work submitted by a client. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingRequest {
    pub data: String,
    #[serde(default = "default_complexity")]
    pub complexity: u8,
}

fn default_complexity() -> u8 {
    MIN_COMPLEXITY
}

impl ProcessingRequest {
    pub fn new(data: impl Into<String>, complexity: u8) -> Self {
        Self {
            data: data.into(),
            complexity,
        }
    }

    /// Clamp complexity into `[MIN_COMPLEXITY, MAX_COMPLEXITY]` on ingress.
    pub fn clamped(mut self) -> Self {
        self.complexity = self.complexity.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY);
        self
    }
}

/// Outcome of one completed unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub processed_data: String,
    pub message: String,
    /// Epoch milliseconds at the moment processing finished.
    pub timestamp: i64,
    pub complexity: u8,
}

impl ProcessingResult {
    pub fn new(processed_data: impl Into<String>, timestamp: i64, complexity: u8) -> Self {
        Self {
            processed_data: processed_data.into(),
            message: RESULT_MESSAGE.to_string(),
            timestamp,
            complexity,
        }
    }
}

/// Lifecycle state of a task. The only transitions are
/// `Processing -> Completed` and `Processing -> Failed`; terminal states
/// are sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Pollable record of an accepted task.
///
/// Invariants, maintained by the task table:
/// - `Completed` implies `result` present, `error_message` absent,
///   `completed_at` set;
/// - `Failed` implies `error_message` present, `result` absent,
///   `completed_at` set;
/// - `Processing` implies `completed_at` absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    pub result: Option<ProcessingResult>,
    pub error_message: Option<String>,
    /// Epoch milliseconds when the task was accepted.
    pub created_at: i64,
    /// Epoch milliseconds when the task reached a terminal status.
    pub completed_at: Option<i64>,
    pub original_request: ProcessingRequest,
}

impl TaskRecord {
    /// A freshly accepted record in `Processing` state.
    pub fn processing(task_id: impl Into<String>, request: ProcessingRequest, now: i64) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Processing,
            result: None,
            error_message: None,
            created_at: now,
            completed_at: None,
            original_request: request,
        }
    }

    /// Move the record to `Completed`. Callers must hold the table's entry
    /// lock and have verified the record is still `Processing`.
    pub fn complete(&mut self, result: ProcessingResult, at: i64) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error_message = None;
        self.completed_at = Some(at);
    }

    /// Move the record to `Failed`. Same locking contract as [`complete`].
    ///
    /// [`complete`]: TaskRecord::complete
    pub fn fail(&mut self, message: impl Into<String>, at: i64) {
        self.status = TaskStatus::Failed;
        self.error_message = Some(message.into());
        self.result = None;
        self.completed_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_clamped_at_both_ends() {
        assert_eq!(ProcessingRequest::new("x", 0).clamped().complexity, 1);
        assert_eq!(ProcessingRequest::new("x", 1).clamped().complexity, 1);
        assert_eq!(ProcessingRequest::new("x", 10).clamped().complexity, 10);
        assert_eq!(ProcessingRequest::new("x", 11).clamped().complexity, 10);
        assert_eq!(ProcessingRequest::new("x", 15).clamped().complexity, 10);
    }

    #[test]
    fn test_complexity_defaults_to_one() {
        let req: ProcessingRequest = serde_json::from_str(r#"{"data":"hello"}"#).expect("parses");
        assert_eq!(req.complexity, 1);
        assert_eq!(req.data, "hello");
    }

    #[test]
    fn test_record_json_field_names() {
        let record = TaskRecord::processing("task-1", ProcessingRequest::new("x", 3), 1_000);
        let json = serde_json::to_value(&record).expect("serializes");

        assert_eq!(json["taskId"], "task-1");
        assert_eq!(json["status"], "PROCESSING");
        assert!(json["result"].is_null());
        assert!(json["errorMessage"].is_null());
        assert_eq!(json["createdAt"], 1_000);
        assert!(json["completedAt"].is_null());
        assert_eq!(json["originalRequest"]["data"], "x");
    }

    #[test]
    fn test_completed_record_invariants() {
        let mut record = TaskRecord::processing("task-2", ProcessingRequest::new("y", 5), 1_000);
        record.complete(ProcessingResult::new("y - processed", 2_000, 5), 2_000);

        assert_eq!(record.status, TaskStatus::Completed);
        assert!(record.result.is_some());
        assert!(record.error_message.is_none());
        assert_eq!(record.completed_at, Some(2_000));

        let json = serde_json::to_value(&record).expect("serializes");
        assert_eq!(json["status"], "COMPLETED");
        assert_eq!(json["result"]["processedData"], "y - processed");
        assert_eq!(json["result"]["message"], RESULT_MESSAGE);
    }

    #[test]
    fn test_failed_record_invariants() {
        let mut record = TaskRecord::processing("task-3", ProcessingRequest::new("z", 2), 1_000);
        record.fail("worker exploded", 1_500);

        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.result.is_none());
        assert_eq!(record.error_message.as_deref(), Some("worker exploded"));
        assert_eq!(record.completed_at, Some(1_500));
        assert!(record.status.is_terminal());
    }
}
