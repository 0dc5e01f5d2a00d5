//! Vectorization job endpoints.
//!
//! - POST /trigger-vectorization        : Start the migration script
//! - GET  /vectorization-status         : Latest status record
//! - GET  /vectorization-status/stream  : SSE stream of status transitions

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use proposal_desk_jobs::{JobStatus, TriggerOutcome};
use proposal_desk_types::TriggerResponse;
use tokio::sync::broadcast::error::RecvError;

use crate::error::ApiResult;
use crate::state::{AppState, VECTORIZATION_TASK};

/// POST /api/trigger-vectorization - Start the vectorization migration.
///
/// Returns:
/// - 202 Accepted: run scheduled (`status: "started"`)
/// - 409 Conflict: a run is already in flight (`status: "rejected"`)
/// - 503 Service Unavailable: the run could not be scheduled (`status: "error"`)
///
/// The run happens in the background. Poll /api/vectorization-status for completion.
pub async fn trigger_vectorization(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let outcome = state.jobs.trigger(VECTORIZATION_TASK)?;

    let (code, body) = match &outcome {
        TriggerOutcome::Started(_) => (
            StatusCode::ACCEPTED,
            TriggerResponse::started("Vectorization started. Poll /api/vectorization-status for completion."),
        ),
        TriggerOutcome::Rejected(status) => (StatusCode::CONFLICT, TriggerResponse::rejected(rejected_message(status))),
        TriggerOutcome::Failed(status) => (
            StatusCode::SERVICE_UNAVAILABLE,
            TriggerResponse::error(status.message.clone()),
        ),
    };

    Ok((code, Json(body)).into_response())
}

fn rejected_message(status: &JobStatus) -> String {
    match status.last_run {
        Some(started) => format!(
            "Vectorization already in progress (started {}). Please wait for it to complete.",
            started.to_rfc3339()
        ),
        None => "Vectorization already in progress. Please wait for it to complete.".to_string(),
    }
}

/// GET /api/vectorization-status - Latest status record. Never waits on a run.
pub async fn vectorization_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<JobStatus>> {
    Ok(Json(state.jobs.get_status(VECTORIZATION_TASK)?))
}

/// GET /api/vectorization-status/stream - SSE stream of status records.
///
/// The first event is the current record; one event follows per transition.
pub async fn stream_vectorization_status(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>> {
    // Subscribe before reading so a transition between the two is not lost.
    let mut rx = state.jobs.subscribe();
    let current = state.jobs.get_status(VECTORIZATION_TASK)?;

    let stream = async_stream::stream! {
        yield Ok(status_event(&current));
        loop {
            match rx.recv().await {
                Ok(event) if event.task == VECTORIZATION_TASK => {
                    yield Ok(status_event(&event.status));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Status stream lagged, resending current status");
                    if let Ok(status) = state.jobs.get_status(VECTORIZATION_TASK) {
                        yield Ok(status_event(&status));
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn status_event(status: &JobStatus) -> Event {
    let json = serde_json::to_string(status).unwrap_or_default();
    Event::default().event("status").data(json)
}

/// Create the vectorization routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trigger-vectorization", post(trigger_vectorization))
        .route("/vectorization-status", get(vectorization_status))
        .route("/vectorization-status/stream", get(stream_vectorization_status))
}
