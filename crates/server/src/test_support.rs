// crates/server/src/test_support.rs
//! Fixtures shared by the route unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use proposal_desk_jobs::{JobRunner, JobTask, MemoryStatusStore, TaskError, TaskReport};
use proposal_desk_types::CollectionStats;

use crate::state::{AppState, VECTORIZATION_TASK};
use crate::stats::StatsProvider;

/// Task that finishes immediately with a fixed result.
pub struct InstantTask(Result<String, String>);

impl InstantTask {
    pub fn ok() -> Arc<dyn JobTask> {
        Arc::new(Self(Ok("done".to_string())))
    }

    pub fn failing(message: &str) -> Arc<dyn JobTask> {
        Arc::new(Self(Err(message.to_string())))
    }
}

#[async_trait]
impl JobTask for InstantTask {
    async fn run(&self) -> Result<TaskReport, TaskError> {
        match &self.0 {
            Ok(summary) => Ok(TaskReport::new(summary.clone())),
            Err(message) => Err(TaskError::Failed(message.clone())),
        }
    }
}

/// Stats provider returning a canned value.
pub struct FixedStats(pub CollectionStats);

#[async_trait]
impl StatsProvider for FixedStats {
    async fn collection_stats(&self) -> CollectionStats {
        self.0.clone()
    }
}

pub fn test_state(task: Arc<dyn JobTask>) -> Arc<AppState> {
    test_state_with_stats(task, Arc::new(FixedStats(CollectionStats::connected("projects", 0))))
}

/// Must be called inside a tokio runtime.
pub fn test_state_with_stats(task: Arc<dyn JobTask>, stats: Arc<dyn StatsProvider>) -> Arc<AppState> {
    let jobs = JobRunner::builder()
        .task(
            VECTORIZATION_TASK,
            task,
            Arc::new(MemoryStatusStore::new(crate::initial_vectorization_status())),
        )
        .build()
        .unwrap();
    AppState::new(Arc::new(jobs), stats)
}
