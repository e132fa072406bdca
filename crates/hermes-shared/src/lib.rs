//! # Hermes Shared Components
//!
//! Common building blocks for the two Hermes services:
//!
//! - **Wire types** ([`types`]): the JSON envelopes exchanged with clients
//!   on both the dispatch HTTP API and the chat WebSocket.
//! - **Configuration** ([`config`]): TOML file plus environment overrides.
//! - **Errors** ([`error`]): the shared error taxonomy.
//! - **Ids and time** ([`ids`]): process-local monotonic id generators and
//!   the epoch-millisecond clock used for every wire timestamp.
//! - **Logging** ([`logging`]): tracing subscriber bootstrap for binaries.
//! - **Metrics** ([`metrics`]): in-process overflow and throughput counters.

pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod types;

pub use error::{HermesError, HermesResult};
