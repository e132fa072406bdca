//! # Processor
//!
//! Synthetic workload execution. The work itself is a deterministic
//! function of request complexity, and it always runs on the blocking
//! worker pool, never on the I/O event loop, where a long sleep would
//! starve every connection on the runtime.

use std::time::Duration;

use async_trait::async_trait;

use hermes_shared::ids::epoch_millis;
use hermes_shared::types::{ProcessingRequest, ProcessingResult, MAX_COMPLEXITY, MIN_COMPLEXITY};
use hermes_shared::{HermesError, HermesResult};

/// Suffix appended to the request payload by the reference derivation.
pub const PROCESSED_SUFFIX: &str = " - processed";

/// Derive the processed payload. Pure: the same input always produces the
/// same output.
pub fn derive_processed_data(data: &str) -> String {
    format!("{data}{PROCESSED_SUFFIX}")
}

/// Deterministic work duration for a given complexity.
///
/// Complexity 1 maps to 6 000 ms and complexity 10 to 60 000 ms, linearly
/// in between.
pub fn duration_ms(complexity: u8) -> u64 {
    let c = complexity.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY) as f64;
    (((c - 1.0) / 9.0 * 0.9 + 0.1) * 60_000.0).ceil() as u64
}

/// The workload seam. Production uses [`SyntheticProcessor`]; tests swap in
/// fast fakes so suites run in milliseconds.
#[async_trait]
pub trait Processor: Send + Sync + 'static {
    async fn run(&self, request: ProcessingRequest) -> HermesResult<ProcessingResult>;
}

/// The real workload: a blocking sleep proportional to complexity followed
/// by the payload derivation.
#[derive(Debug, Default)]
pub struct SyntheticProcessor;

#[async_trait]
impl Processor for SyntheticProcessor {
    async fn run(&self, request: ProcessingRequest) -> HermesResult<ProcessingResult> {
        let wait = Duration::from_millis(duration_ms(request.complexity));
        tokio::task::spawn_blocking(move || {
            std::thread::sleep(wait);
            ProcessingResult::new(
                derive_processed_data(&request.data),
                epoch_millis(),
                request.complexity,
            )
        })
        .await
        .map_err(|join_err| {
            if join_err.is_cancelled() {
                HermesError::Cancelled
            } else {
                HermesError::Processing(join_err.to_string())
            }
        })
    }
}
