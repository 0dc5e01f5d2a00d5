// crates/types/src/job.rs
//! Background job status records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle state of a background job.
///
/// `Idle`, `Completed` and `Error` are all "not running": a new trigger is
/// accepted from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Never run since the status record was created.
    Idle,
    /// A run is in flight.
    Running,
    /// The last run finished successfully.
    Completed,
    /// The last run failed, or could not be scheduled.
    Error,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    /// `Completed` or `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The latest status record of a job. Only one is kept per job; there is no
/// run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
pub struct JobStatus {
    #[serde(rename = "status")]
    pub state: JobState,
    /// Time of the most recent accepted trigger.
    #[ts(type = "string | null")]
    pub last_run: Option<DateTime<Utc>>,
    pub message: String,
}

impl JobStatus {
    pub fn idle(message: impl Into<String>) -> Self {
        Self {
            state: JobState::Idle,
            last_run: None,
            message: message.into(),
        }
    }

    pub fn running(last_run: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            state: JobState::Running,
            last_run: Some(last_run),
            message: message.into(),
        }
    }

    pub fn completed(last_run: Option<DateTime<Utc>>, message: impl Into<String>) -> Self {
        Self {
            state: JobState::Completed,
            last_run,
            message: message.into(),
        }
    }

    pub fn error(last_run: Option<DateTime<Utc>>, message: impl Into<String>) -> Self {
        Self {
            state: JobState::Error,
            last_run,
            message: message.into(),
        }
    }
}

/// Outcome reported to the caller of `POST /api/trigger-vectorization`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
#[serde(rename_all = "lowercase")]
pub enum TriggerStatus {
    /// A run was scheduled.
    Started,
    /// A run was already in flight; nothing happened.
    Rejected,
    /// The run could not be scheduled.
    Error,
}

/// Response body of a trigger request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
pub struct TriggerResponse {
    pub status: TriggerStatus,
    pub message: String,
}

impl TriggerResponse {
    pub fn started(message: impl Into<String>) -> Self {
        Self {
            status: TriggerStatus::Started,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: TriggerStatus::Rejected,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: TriggerStatus::Error,
            message: message.into(),
        }
    }
}
