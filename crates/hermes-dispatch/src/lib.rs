//! # Hermes Dispatch
//!
//! SLA-bounded asynchronous task dispatcher. A request starts processing
//! immediately on the blocking worker pool; if it finishes inside the SLA
//! deadline the completed record is returned synchronously, otherwise the
//! caller gets a `Processing` handle and the work keeps running detached,
//! with its eventual outcome retrievable from the task table.
//!
//! ## Components
//!
//! - [`table::TaskTable`]: concurrent task registry with CAS status
//!   transitions and remove-on-completed-read retrieval.
//! - [`processor::Processor`]: the synthetic-workload seam; the real
//!   implementation sleeps a deterministic duration on the blocking pool.
//! - [`dispatcher::Dispatcher`]: races detached processing against the
//!   SLA deadline.
//! - [`web`]: the axum HTTP surface.

pub mod dispatcher;
pub mod processor;
pub mod table;
pub mod web;

pub use dispatcher::{Dispatcher, SubmitOutcome};
pub use processor::{Processor, SyntheticProcessor};
pub use table::TaskTable;
