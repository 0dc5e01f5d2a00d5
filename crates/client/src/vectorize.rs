// crates/client/src/vectorize.rs
//! Trigger a vectorization run and wait for it.

use std::sync::Arc;

use proposal_desk_types::{TriggerResponse, TriggerStatus};
use tokio_util::sync::CancellationToken;

use crate::api::VectorizationApi;
use crate::error::ClientError;
use crate::poller::{PollConfig, PollOutcome, StatusPoller};

/// End result of [`trigger_and_wait`].
#[derive(Debug, Clone, PartialEq)]
pub enum VectorizeOutcome {
    /// Another run was already in flight; nothing was started.
    AlreadyRunning(TriggerResponse),
    /// The server could not schedule the run.
    NotStarted(TriggerResponse),
    /// The run started and polling ended.
    Finished(PollOutcome),
}

impl VectorizeOutcome {
    /// Message shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            VectorizeOutcome::AlreadyRunning(resp) => {
                format!("Vectorization is already running. {}", resp.message)
            }
            VectorizeOutcome::NotStarted(resp) => {
                format!("Vectorization could not be started: {}", resp.message)
            }
            VectorizeOutcome::Finished(PollOutcome::Completed { status, stats }) => match stats {
                Some(s) if s.is_connected() => format!(
                    "Vectorization complete: {} documents in '{}'. {}",
                    s.document_count, s.collection_name, status.message
                ),
                Some(s) => format!(
                    "Vectorization complete, but vector stats are unavailable ({}). {}",
                    s.error.as_deref().unwrap_or("unknown error"),
                    status.message
                ),
                None => format!("Vectorization complete. {}", status.message),
            },
            VectorizeOutcome::Finished(PollOutcome::Failed { status }) => {
                format!("Vectorization failed: {}", status.message)
            }
            VectorizeOutcome::Finished(PollOutcome::TimedOut { elapsed, .. }) => format!(
                "Timed out after {}s waiting for vectorization. It may still be running on the server; check the status later.",
                elapsed.as_secs()
            ),
            VectorizeOutcome::Finished(PollOutcome::Cancelled) => {
                "Stopped waiting for vectorization.".to_string()
            }
        }
    }

    /// Process exit code: 0 completed, 1 failed, 2 already running,
    /// 3 timed out, 130 cancelled.
    pub fn exit_code(&self) -> i32 {
        match self {
            VectorizeOutcome::Finished(PollOutcome::Completed { .. }) => 0,
            VectorizeOutcome::Finished(PollOutcome::Failed { .. }) | VectorizeOutcome::NotStarted(_) => 1,
            VectorizeOutcome::AlreadyRunning(_) => 2,
            VectorizeOutcome::Finished(PollOutcome::TimedOut { .. }) => 3,
            VectorizeOutcome::Finished(PollOutcome::Cancelled) => 130,
        }
    }
}

/// Trigger a run, then poll until it settles.
///
/// Only a started run is polled. Transport failures on the trigger itself are
/// returned as errors; those during polling are absorbed by the poller.
pub async fn trigger_and_wait(
    api: Arc<dyn VectorizationApi>,
    config: PollConfig,
    cancel: CancellationToken,
) -> Result<VectorizeOutcome, ClientError> {
    let resp = api.trigger().await?;
    match resp.status {
        TriggerStatus::Rejected => {
            tracing::info!(message = %resp.message, "Trigger rejected");
            Ok(VectorizeOutcome::AlreadyRunning(resp))
        }
        TriggerStatus::Error => {
            tracing::error!(message = %resp.message, "Trigger failed");
            Ok(VectorizeOutcome::NotStarted(resp))
        }
        TriggerStatus::Started => {
            tracing::info!(
                interval_secs = config.interval.as_secs(),
                max_polls = config.max_polls(),
                "Vectorization started, polling status"
            );
            let outcome = StatusPoller::new(api, config).run(cancel).await;
            Ok(VectorizeOutcome::Finished(outcome))
        }
    }
}
