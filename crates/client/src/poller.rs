// crates/client/src/poller.rs
//! Polls the vectorization status until the run settles.
//!
//! One status request per interval. `idle` and `completed` stop polling and
//! refresh the collection statistics, `error` stops and surfaces the message,
//! `running` keeps going. Once the ceiling passes the poller gives up with
//! [`PollOutcome::TimedOut`], which is not a job failure: the run may still be
//! going on the server.

use std::sync::Arc;
use std::time::Duration;

use proposal_desk_types::{CollectionStats, JobState, JobStatus};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::VectorizationApi;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CEILING: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// Total time to wait before giving up.
    pub ceiling: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            ceiling: DEFAULT_CEILING,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, ceiling: Duration) -> Self {
        Self { interval, ceiling }
    }

    /// Number of status requests that fit in the ceiling, at least one.
    pub fn max_polls(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let polls = self.ceiling.as_millis() / interval;
        u32::try_from(polls).unwrap_or(u32::MAX).max(1)
    }
}

/// How polling ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The run finished (or the task reads `idle`). `stats` is `None` when
    /// the refresh itself failed.
    Completed {
        status: JobStatus,
        stats: Option<CollectionStats>,
    },
    /// The run ended in `error`.
    Failed { status: JobStatus },
    /// The ceiling passed before a terminal state was seen. `polls` counts
    /// the status requests sent.
    TimedOut { polls: u32, elapsed: Duration },
    Cancelled,
}

pub struct StatusPoller {
    api: Arc<dyn VectorizationApi>,
    config: PollConfig,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn VectorizationApi>, config: PollConfig) -> Self {
        Self { api, config }
    }

    /// Poll until a terminal state, the ceiling, or `cancel` fires.
    ///
    /// The first request goes out one interval after the call. The ceiling is
    /// a wall-clock deadline: a status request still pending when it passes is
    /// abandoned. `max_polls` caps the request count on top of that.
    pub async fn run(&self, cancel: CancellationToken) -> PollOutcome {
        let started = Instant::now();
        let deadline = started + self.config.ceiling;
        let max_polls = self.config.max_polls();
        let mut ticker = time::interval_at(started + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut polls = 0;
        while polls < max_polls {
            // A tick landing exactly on the deadline still gets its request.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                _ = ticker.tick() => {}
                _ = time::sleep_until(deadline) => break,
            }
            polls += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                r = self.api.status() => r,
                _ = time::sleep_until(deadline) => {
                    tracing::warn!(poll = polls, "Status poll still pending at the ceiling");
                    break;
                }
            };

            match result {
                Ok(status) => match status.state {
                    JobState::Running => {
                        tracing::debug!(poll = polls, max_polls, "Vectorization still running");
                    }
                    JobState::Idle | JobState::Completed => {
                        tracing::info!(poll = polls, message = %status.message, "Vectorization finished");
                        let stats = self.refresh_stats().await;
                        return PollOutcome::Completed { status, stats };
                    }
                    JobState::Error => {
                        tracing::warn!(poll = polls, message = %status.message, "Vectorization failed");
                        return PollOutcome::Failed { status };
                    }
                },
                Err(e) => {
                    tracing::warn!(poll = polls, max_polls, error = %e, "Status poll failed");
                }
            }
        }

        let elapsed = started.elapsed();
        tracing::warn!(polls, elapsed_secs = elapsed.as_secs(), "Gave up waiting for vectorization");
        PollOutcome::TimedOut { polls, elapsed }
    }

    /// Run in a background task. Dropping the handle cancels it.
    pub fn spawn(self) -> PollHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let join = tokio::spawn(async move { self.run(token).await });
        PollHandle {
            cancel,
            join: Some(join),
        }
    }

    async fn refresh_stats(&self) -> Option<CollectionStats> {
        match self.api.stats().await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to refresh vector stats");
                None
            }
        }
    }
}

/// Handle to a spawned [`StatusPoller`].
pub struct PollHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<PollOutcome>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for polling to end.
    pub async fn outcome(mut self) -> PollOutcome {
        let Some(join) = self.join.take() else {
            return PollOutcome::Cancelled;
        };
        match join.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Status poller task failed");
                PollOutcome::Cancelled
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
