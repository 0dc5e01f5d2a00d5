// crates/jobs/src/runner.rs
//! Central job runner that gates and executes named background tasks.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use proposal_desk_types::{JobState, JobStatus};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinHandle};

use crate::error::JobError;
use crate::store::{recover_interrupted, StatusStore};
use crate::task::JobTask;

/// Message recorded for a run still in flight when the runner shuts down.
pub const SHUTDOWN_MESSAGE: &str = "Stopped by server shutdown before the run finished";

/// Result of [`JobRunner::trigger`]. Every variant carries the status record
/// as it stands after the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The task was idle or terminal; a run has been queued.
    Started(JobStatus),
    /// A run is already in flight. Nothing changed.
    Rejected(JobStatus),
    /// The run could not be handed to the worker. The status is now `error`.
    Failed(JobStatus),
}

impl TriggerOutcome {
    pub fn status(&self) -> &JobStatus {
        match self {
            Self::Started(s) | Self::Rejected(s) | Self::Failed(s) => s,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Started(_) => "started",
            Self::Rejected(_) => "rejected",
            Self::Failed(_) => "failed",
        }
    }
}

/// A status transition, broadcast to subscribers (SSE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub task: String,
    pub status: JobStatus,
}

/// One accepted trigger waiting for the worker.
#[derive(Debug)]
struct RunTicket {
    triggered_at: DateTime<Utc>,
}

struct TaskSlot {
    store: Arc<dyn StatusStore>,
    /// Serialises the read-check-write of a trigger so two concurrent
    /// triggers cannot both see a non-running state.
    gate: Mutex<()>,
    /// Capacity 1: at most one accepted run waits for the worker.
    queue: mpsc::Sender<RunTicket>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Body of the run in flight, if any. Shared with the worker.
    body: Arc<Mutex<Option<AbortHandle>>>,
}

/// Gates and executes named background tasks, one run in flight per task.
///
/// Each registered task gets its own worker (a tokio task) fed through a
/// single-slot queue. `trigger` never waits for the run: it flips the status
/// to `running`, enqueues, and returns. The worker records `completed` or
/// `error` in the task's [`StatusStore`] when the run ends.
pub struct JobRunner {
    slots: HashMap<String, TaskSlot>,
    events: broadcast::Sender<JobEvent>,
}

impl JobRunner {
    pub fn builder() -> JobRunnerBuilder {
        JobRunnerBuilder::default()
    }

    /// Request a run of `task`.
    ///
    /// Returns `Rejected` without side effects if a run is in flight.
    /// Task failures are never returned here; they land in the status record.
    pub fn trigger(&self, task: &str) -> Result<TriggerOutcome, JobError> {
        let slot = self.slot(task)?;
        let _gate = match slot.gate.lock() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!("Mutex poisoned on trigger gate: {e}");
                e.into_inner()
            }
        };

        let current = slot.store.get();
        if current.state.is_running() {
            tracing::info!(task, last_run = ?current.last_run, "Trigger rejected: run already in flight");
            return Ok(self.finish_trigger(task, TriggerOutcome::Rejected(current)));
        }

        // The record must say `running` before the ticket is visible to the
        // worker, or a fast run could finish first and be overwritten.
        let now = Utc::now();
        let running = JobStatus::running(now, format!("Task '{task}' is running"));
        slot.store.set(running.clone());
        self.publish(task, &running);

        let outcome = match slot.queue.try_send(RunTicket { triggered_at: now }) {
            Ok(()) => {
                tracing::info!(task, "Trigger accepted");
                TriggerOutcome::Started(running)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(task, "Trigger found a run already queued");
                TriggerOutcome::Rejected(running)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::error!(task, "Trigger failed: job worker is not running");
                let failed = JobStatus::error(
                    Some(now),
                    format!("Could not schedule task '{task}': background worker is not running"),
                );
                slot.store.set(failed.clone());
                self.publish(task, &failed);
                TriggerOutcome::Failed(failed)
            }
        };
        Ok(self.finish_trigger(task, outcome))
    }

    /// Current status of `task`. Never waits on a run.
    pub fn get_status(&self, task: &str) -> Result<JobStatus, JobError> {
        Ok(self.slot(task)?.store.get())
    }

    /// Subscribe to status transitions of all tasks.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Names of registered tasks, sorted.
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Stop all workers. Runs in flight are abandoned and recorded as
    /// `error`; later triggers resolve to [`TriggerOutcome::Failed`].
    pub async fn shutdown(&self) {
        for (name, slot) in &self.slots {
            let handle = match slot.worker.lock() {
                Ok(mut guard) => guard.take(),
                Err(e) => {
                    tracing::error!("Mutex poisoned on worker handle: {e}");
                    e.into_inner().take()
                }
            };
            let Some(handle) = handle else { continue };
            handle.abort();
            // Cancelled is the expected join result here.
            let _ = handle.await;
            // The worker is gone, so nothing can replace this handle now.
            if let Some(body) = lock_body(&slot.body).take() {
                body.abort();
                tracing::info!(task = %name, "Aborted run in flight");
            }

            let status = slot.store.get();
            if status.state.is_running() {
                let stopped = JobStatus::error(status.last_run, SHUTDOWN_MESSAGE);
                slot.store.set(stopped.clone());
                self.publish(name, &stopped);
            }
            tracing::info!(task = %name, "Job worker stopped");
        }
    }

    fn slot(&self, task: &str) -> Result<&TaskSlot, JobError> {
        self.slots
            .get(task)
            .ok_or_else(|| JobError::UnknownTask(task.to_string()))
    }

    fn publish(&self, task: &str, status: &JobStatus) {
        // No subscribers is fine.
        let _ = self.events.send(JobEvent {
            task: task.to_string(),
            status: status.clone(),
        });
    }

    fn finish_trigger(&self, task: &str, outcome: TriggerOutcome) -> TriggerOutcome {
        counter!("job_triggers_total", "task" => task.to_string(), "outcome" => outcome.label())
            .increment(1);
        outcome
    }
}

/// Registers tasks and spawns their workers.
#[derive(Default)]
pub struct JobRunnerBuilder {
    tasks: Vec<Registration>,
}

struct Registration {
    name: String,
    task: Arc<dyn JobTask>,
    store: Arc<dyn StatusStore>,
}

impl JobRunnerBuilder {
    /// Register `task` under `name`, with `store` holding its status.
    pub fn task(
        mut self,
        name: impl Into<String>,
        task: Arc<dyn JobTask>,
        store: Arc<dyn StatusStore>,
    ) -> Self {
        self.tasks.push(Registration {
            name: name.into(),
            task,
            store,
        });
        self
    }

    /// Spawn one worker per task on the current tokio runtime.
    ///
    /// A store still reading `running` (left over from a previous process) is
    /// rewritten to `error` first, since that run's outcome is unknown.
    pub fn build(self) -> Result<JobRunner, JobError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| JobError::NoRuntime)?;

        let mut seen = HashSet::new();
        for reg in &self.tasks {
            if !seen.insert(reg.name.as_str()) {
                return Err(JobError::DuplicateTask(reg.name.clone()));
            }
        }

        let (events, _) = broadcast::channel(64);
        let mut slots = HashMap::new();
        for reg in self.tasks {
            recover_interrupted(reg.store.as_ref());

            let (queue, rx) = mpsc::channel(1);
            let body = Arc::new(Mutex::new(None));
            let worker = Worker {
                name: reg.name.clone(),
                task: reg.task,
                store: Arc::clone(&reg.store),
                events: events.clone(),
                body: Arc::clone(&body),
            };
            let handle = runtime.spawn(worker.run(rx));
            tracing::debug!(task = %reg.name, "Job worker started");

            slots.insert(
                reg.name,
                TaskSlot {
                    store: reg.store,
                    gate: Mutex::new(()),
                    queue,
                    worker: Mutex::new(Some(handle)),
                    body,
                },
            );
        }

        Ok(JobRunner { slots, events })
    }
}

/// Executes queued runs of one task, one at a time.
struct Worker {
    name: String,
    task: Arc<dyn JobTask>,
    store: Arc<dyn StatusStore>,
    events: broadcast::Sender<JobEvent>,
    body: Arc<Mutex<Option<AbortHandle>>>,
}

impl Worker {
    async fn run(self, mut queue: mpsc::Receiver<RunTicket>) {
        while let Some(ticket) = queue.recv().await {
            self.run_once(ticket).await;
        }
        tracing::debug!(task = %self.name, "Job queue closed");
    }

    async fn run_once(&self, ticket: RunTicket) {
        let t0 = Instant::now();
        let last_run = Some(ticket.triggered_at);
        tracing::info!(task = %self.name, "Run starting");

        // Run the body in its own task so a panic is caught as a JoinError.
        let task = Arc::clone(&self.task);
        let handle = tokio::spawn(async move { task.run().await });
        *lock_body(&self.body) = Some(handle.abort_handle());
        let result = handle.await;
        lock_body(&self.body).take();
        let elapsed = t0.elapsed();

        let status = match result {
            Ok(Ok(report)) => {
                tracing::info!(task = %self.name, duration_secs = elapsed.as_secs_f64(), "Run completed");
                JobStatus::completed(last_run, report.summary)
            }
            Ok(Err(e)) => {
                tracing::warn!(task = %self.name, error = %e, duration_secs = elapsed.as_secs_f64(), "Run failed");
                JobStatus::error(last_run, non_empty(e.to_string()))
            }
            Err(e) => {
                tracing::error!(task = %self.name, error = %e, "Run aborted");
                JobStatus::error(last_run, format!("Task aborted: {e}"))
            }
        };

        record_run(&self.name, status.state, elapsed);
        self.store.set(status.clone());
        let _ = self.events.send(JobEvent {
            task: self.name.clone(),
            status,
        });
    }
}

fn lock_body(body: &Mutex<Option<AbortHandle>>) -> std::sync::MutexGuard<'_, Option<AbortHandle>> {
    match body.lock() {
        Ok(guard) => guard,
        Err(e) => {
            tracing::error!("Mutex poisoned on run handle: {e}");
            e.into_inner()
        }
    }
}

fn non_empty(message: String) -> String {
    if message.trim().is_empty() {
        "Task failed without output".to_string()
    } else {
        message
    }
}

fn record_run(task: &str, state: JobState, elapsed: Duration) {
    counter!("job_runs_total", "task" => task.to_string(), "outcome" => state.as_str()).increment(1);
    histogram!("job_run_duration_seconds", "task" => task.to_string()).record(elapsed.as_secs_f64());
}
