//! # Error Types
//!
//! Unified error taxonomy for the Hermes services. Client-recoverable
//! conditions (malformed bodies, missing tasks) are mapped to HTTP or
//! system-message responses at the edges; everything here is what the
//! service layers propagate internally.

use thiserror::Error;

/// Shared result type for Hermes operations.
pub type HermesResult<T> = Result<T, HermesError>;

/// Errors raised by the Hermes service layers.
#[derive(Debug, Error)]
pub enum HermesError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    #[error("duplicate task id: {task_id}")]
    DuplicateTask { task_id: String },

    #[error("processing failed: {0}")]
    Processing(String),

    #[error("processing cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HermesError {
    /// Create a configuration error from any displayable cause.
    pub fn config(cause: impl std::fmt::Display) -> Self {
        Self::Config(cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_task_id() {
        let err = HermesError::TaskNotFound {
            task_id: "task-42".to_string(),
        };
        assert_eq!(err.to_string(), "task not found: task-42");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "port busy");
        let err: HermesError = io.into();
        assert!(matches!(err, HermesError::Io(_)));
    }
}
