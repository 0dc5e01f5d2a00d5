// crates/types/src/lib.rs
//! Wire types shared by the proposal-desk server, its CLI client, and the
//! React frontend (exported to TypeScript via `ts-rs`).

mod job;
mod stats;

pub use job::{JobState, JobStatus, TriggerResponse, TriggerStatus};
pub use stats::CollectionStats;
