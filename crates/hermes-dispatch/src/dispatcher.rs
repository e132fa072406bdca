//! # Dispatcher
//!
//! Glues request ingestion to the [`Processor`] under an SLA deadline.
//!
//! The processor runs as a detached task whose only link back to the
//! request is the shared [`TaskTable`]: cancelling the HTTP request (or
//! timing out the SLA wait) never cancels the work. Completion inside the
//! deadline is observed through a oneshot carrying the updated record.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use hermes_shared::ids::{epoch_millis, TaskIds};
use hermes_shared::metrics::DispatchMetrics;
use hermes_shared::types::{ProcessingRequest, TaskRecord, TaskStatus};
use hermes_shared::HermesResult;

use crate::processor::Processor;
use crate::table::TaskTable;

/// Result of a submission, mapped to an HTTP status by the web layer.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Work finished successfully inside the SLA -> 200.
    Completed(TaskRecord),
    /// Work failed inside the SLA -> 500.
    Failed(TaskRecord),
    /// The SLA elapsed first; the record is a pollable handle -> 202.
    Pending(TaskRecord),
}

impl SubmitOutcome {
    pub fn record(&self) -> &TaskRecord {
        match self {
            Self::Completed(r) | Self::Failed(r) | Self::Pending(r) => r,
        }
    }

    fn from_record(record: TaskRecord) -> Self {
        match record.status {
            TaskStatus::Completed => Self::Completed(record),
            TaskStatus::Failed => Self::Failed(record),
            TaskStatus::Processing => Self::Pending(record),
        }
    }
}

/// Accepts processing requests and enforces the SLA race.
pub struct Dispatcher {
    table: Arc<TaskTable>,
    processor: Arc<dyn Processor>,
    ids: TaskIds,
    sla: Duration,
    metrics: Arc<DispatchMetrics>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("sla", &self.sla).finish()
    }
}

impl Dispatcher {
    pub fn new(
        table: Arc<TaskTable>,
        processor: Arc<dyn Processor>,
        sla: Duration,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            table,
            processor,
            ids: TaskIds::new(),
            sla,
            metrics,
        }
    }

    /// Accept a request: register it, start processing detached, and wait
    /// for completion or the SLA deadline, whichever comes first.
    pub async fn submit(&self, request: ProcessingRequest) -> HermesResult<SubmitOutcome> {
        let request = request.clamped();
        let task_id = self.ids.next();
        let record = TaskRecord::processing(&task_id, request.clone(), epoch_millis());
        self.table.insert_initial(record.clone())?;
        self.metrics.record_submitted();
        debug!(task_id = %task_id, complexity = request.complexity, "Task accepted");

        let (done_tx, done_rx) = oneshot::channel();
        let table = self.table.clone();
        let processor = self.processor.clone();
        let metrics = self.metrics.clone();
        let id = task_id.clone();

        // Detached on purpose: dropping the submit future must not stop the
        // work. The spawned task is the record's only status writer.
        tokio::spawn(async move {
            let updated = match processor.run(request).await {
                Ok(result) => {
                    metrics.record_completed();
                    table.mark_completed(&id, result)
                }
                Err(err) => {
                    warn!(task_id = %id, error = %err, "Processing failed");
                    metrics.record_failed();
                    table.mark_failed(&id, err.to_string())
                }
            };
            match updated {
                Some(record) => {
                    let _ = done_tx.send(record);
                }
                None => debug!(task_id = %id, "Record already terminal or collected"),
            }
        });

        match tokio::time::timeout(self.sla, done_rx).await {
            Ok(Ok(record)) => Ok(SubmitOutcome::from_record(record)),
            Ok(Err(_closed)) => {
                // The worker finished without a CAS win; report whatever
                // state the table holds now.
                Ok(self.current_outcome(&task_id, record))
            }
            Err(_elapsed) => {
                self.metrics.record_sla_timeout();
                info!(task_id = %task_id, sla_ms = self.sla.as_millis() as u64,
                    "SLA elapsed, returning processing handle");
                Ok(self.current_outcome(&task_id, record))
            }
        }
    }

    fn current_outcome(&self, task_id: &str, fallback: TaskRecord) -> SubmitOutcome {
        // A concurrent poller may already have collected a completed record;
        // the initial snapshot then stands in as the handle.
        let record = self.table.get(task_id).unwrap_or(fallback);
        SubmitOutcome::from_record(record)
    }

    pub fn sla(&self) -> Duration {
        self.sla
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hermes_shared::types::ProcessingResult;
    use hermes_shared::HermesError;

    use crate::processor::derive_processed_data;

    /// Test double: completes (or fails) after a configurable delay.
    struct ScriptedProcessor {
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl Processor for ScriptedProcessor {
        async fn run(&self, request: ProcessingRequest) -> HermesResult<ProcessingResult> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(HermesError::Processing("scripted failure".to_string()))
            } else {
                Ok(ProcessingResult::new(
                    derive_processed_data(&request.data),
                    epoch_millis(),
                    request.complexity,
                ))
            }
        }
    }

    fn dispatcher(delay: Duration, fail: bool, sla: Duration) -> (Dispatcher, Arc<TaskTable>) {
        let table = Arc::new(TaskTable::new());
        let dispatcher = Dispatcher::new(
            table.clone(),
            Arc::new(ScriptedProcessor { delay, fail }),
            sla,
            Arc::new(DispatchMetrics::new()),
        );
        (dispatcher, table)
    }

    #[tokio::test]
    async fn test_completion_inside_sla_returns_completed() {
        let (dispatcher, _table) =
            dispatcher(Duration::from_millis(10), false, Duration::from_millis(500));

        let outcome = dispatcher
            .submit(ProcessingRequest::new("x", 1))
            .await
            .expect("submit succeeds");

        match outcome {
            SubmitOutcome::Completed(record) => {
                assert_eq!(record.status, TaskStatus::Completed);
                let result = record.result.expect("result present");
                assert_eq!(result.processed_data, "x - processed");
                assert_eq!(result.complexity, 1);
                assert!(record.completed_at.is_some());
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_inside_sla_returns_failed() {
        let (dispatcher, _table) =
            dispatcher(Duration::from_millis(10), true, Duration::from_millis(500));

        let outcome = dispatcher
            .submit(ProcessingRequest::new("x", 1))
            .await
            .expect("submit succeeds");

        match outcome {
            SubmitOutcome::Failed(record) => {
                assert_eq!(record.status, TaskStatus::Failed);
                assert!(record
                    .error_message
                    .as_deref()
                    .expect("error message present")
                    .contains("scripted failure"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sla_timeout_returns_handle_and_work_continues() {
        let (dispatcher, table) =
            dispatcher(Duration::from_millis(120), false, Duration::from_millis(20));

        let outcome = dispatcher
            .submit(ProcessingRequest::new("y", 2))
            .await
            .expect("submit succeeds");

        let task_id = match outcome {
            SubmitOutcome::Pending(record) => {
                assert_eq!(record.status, TaskStatus::Processing);
                assert!(record.completed_at.is_none());
                record.task_id
            }
            other => panic!("expected Pending, got {other:?}"),
        };

        // The detached worker is not cancelled by submit returning.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let record = table.get(&task_id).expect("record still present");
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(
            record.result.expect("result present").processed_data,
            "y - processed"
        );
    }

    #[tokio::test]
    async fn test_aborted_request_does_not_cancel_work() {
        let (dispatcher, table) =
            dispatcher(Duration::from_millis(80), false, Duration::from_millis(500));
        let dispatcher = Arc::new(dispatcher);

        // Simulate a client disconnect: the request-scoped task is aborted
        // mid-wait.
        let request_task = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.submit(ProcessingRequest::new("z", 1)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        request_task.abort();
        assert!(request_task.await.is_err(), "request task was aborted");

        tokio::time::sleep(Duration::from_millis(200)).await;
        let ids = table.list_ids();
        assert_eq!(ids.len(), 1, "record was registered before the abort");
        let record = table.get(&ids[0]).expect("record present");
        assert_eq!(record.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_complexity_clamped_on_ingress() {
        let (dispatcher, _table) =
            dispatcher(Duration::from_millis(1), false, Duration::from_millis(500));

        let outcome = dispatcher
            .submit(ProcessingRequest::new("w", 15))
            .await
            .expect("submit succeeds");

        assert_eq!(outcome.record().original_request.complexity, 10);
    }

    #[tokio::test]
    async fn test_task_ids_are_unique_across_submissions() {
        let (dispatcher, _table) =
            dispatcher(Duration::from_millis(1), false, Duration::from_millis(500));

        let a = dispatcher
            .submit(ProcessingRequest::new("a", 1))
            .await
            .expect("submit");
        let b = dispatcher
            .submit(ProcessingRequest::new("b", 1))
            .await
            .expect("submit");
        assert_ne!(a.record().task_id, b.record().task_id);
    }
}
