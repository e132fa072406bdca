//! # Wire Types
//!
//! JSON envelopes shared with clients. Field names follow the public
//! contract (`taskId`, `processedData`, ...), so every rename lives here
//! and nowhere else.

pub mod chat;
pub mod task;

pub use chat::{ChatMessage, MessageKind, SYSTEM_SENDER};
pub use task::{
    ProcessingRequest, ProcessingResult, TaskRecord, TaskStatus, MAX_COMPLEXITY, MIN_COMPLEXITY,
};
