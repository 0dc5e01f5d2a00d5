// crates/jobs/src/lib.rs
//! Single-flight background jobs.
//!
//! Provides:
//! - `JobRunner`: gates triggers so each named task has at most one run in
//!   flight, and executes accepted runs on a per-task worker
//! - `StatusStore`: holder of the latest `JobStatus` per task (in-memory or
//!   file-backed)
//! - `JobTask`: the work a run performs; `ScriptTask` runs an external
//!   script as a child process

pub mod error;
pub mod runner;
pub mod store;
pub mod task;

pub use error::{JobError, StoreError, TaskError};
pub use runner::{JobEvent, JobRunner, JobRunnerBuilder, TriggerOutcome};
pub use store::{recover_interrupted, FileStatusStore, MemoryStatusStore, StatusStore};
pub use task::{JobTask, ScriptTask, TaskReport};

pub use proposal_desk_types::{JobState, JobStatus};
