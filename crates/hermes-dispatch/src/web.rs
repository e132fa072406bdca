//! # Dispatch HTTP API
//!
//! JSON over HTTP, axum handlers:
//!
//! | Method | Path                         | Response                        |
//! |--------|------------------------------|---------------------------------|
//! | POST   | `/api/process`               | 200/202/500 task record         |
//! | GET    | `/api/task/result/{task_id}` | 200 record, 404 when absent     |
//! | GET    | `/api/tasks/{task_id}`       | alias of the above              |
//! | GET    | `/api/task/list`             | 200 array of task ids           |
//! | GET    | `/api/tasks`                 | alias of the above              |
//! | GET    | `/api/health`                | 200 health document             |
//!
//! Reading a `COMPLETED` record removes it from the table; the first read
//! returns 200, every later one 404.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::warn;

use hermes_shared::metrics::{DispatchMetrics, DispatchMetricsSnapshot};
use hermes_shared::types::ProcessingRequest;

use crate::dispatcher::{Dispatcher, SubmitOutcome};
use crate::table::TaskTable;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub table: Arc<TaskTable>,
    pub metrics: Arc<DispatchMetrics>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Small error envelope returned for malformed requests.
#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: String,
}

/// Health document exposed on `/api/health`.
#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    tasks_in_flight: usize,
    metrics: DispatchMetricsSnapshot,
}

/// Build the dispatch router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/process", post(submit_task))
        .route("/api/task/result/{task_id}", get(task_result))
        .route("/api/tasks/{task_id}", get(task_result))
        .route("/api/task/list", get(task_list))
        .route("/api/tasks", get(task_list))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn submit_task(
    State(state): State<AppState>,
    payload: Result<Json<ProcessingRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorEnvelope {
                    error: rejection.body_text(),
                }),
            )
                .into_response();
        }
    };

    match state.dispatcher.submit(request).await {
        Ok(SubmitOutcome::Completed(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(SubmitOutcome::Pending(record)) => (StatusCode::ACCEPTED, Json(record)).into_response(),
        Ok(SubmitOutcome::Failed(record)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(record)).into_response()
        }
        Err(err) => {
            warn!(error = %err, "Submission rejected");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorEnvelope {
                    error: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn task_result(State(state): State<AppState>, Path(task_id): Path<String>) -> Response {
    match state.table.get_and_maybe_remove(&task_id) {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn task_list(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.table.list_ids())
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "UP",
        tasks_in_flight: state.table.processing_count(),
        metrics: state.metrics.snapshot(),
    })
}
