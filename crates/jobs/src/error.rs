// crates/jobs/src/error.rs
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by `JobRunner` itself. Failures of the task body are never
/// returned here; they end up in the task's `JobStatus`.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Task registered twice: {0}")]
    DuplicateTask(String),

    #[error("Job runner must be built inside a tokio runtime")]
    NoRuntime,
}

/// Why a run of a task failed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", describe_exit(.code, .output))]
    NonZeroExit { code: Option<i32>, output: String },

    #[error("error waiting for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The script was killed; `output` is what it had written until then.
    #[error("{}", describe_timeout(.after, .output))]
    TimedOut { after: Duration, output: String },

    #[error("{0}")]
    Failed(String),
}

fn describe_exit(code: &Option<i32>, output: &str) -> String {
    let head = match code {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_string(),
    };
    if output.is_empty() {
        head
    } else {
        format!("{head}: {output}")
    }
}

fn describe_timeout(after: &Duration, output: &str) -> String {
    let head = if after.subsec_nanos() == 0 {
        format!("timed out after {}s", after.as_secs())
    } else {
        format!("timed out after {}ms", after.as_millis())
    };
    if output.is_empty() {
        head
    } else {
        format!("{head}: {output}")
    }
}

/// Errors opening a file-backed status store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error accessing status file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
