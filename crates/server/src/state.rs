// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use proposal_desk_jobs::JobRunner;

use crate::stats::StatsProvider;

/// Name under which the vectorization migration is registered with the
/// [`JobRunner`].
pub const VECTORIZATION_TASK: &str = "vectorization";

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Background job runner; owns the status record of every task.
    pub jobs: Arc<JobRunner>,
    /// Vector-database statistics refreshed after vectorization runs.
    pub stats: Arc<dyn StatsProvider>,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(jobs: Arc<JobRunner>, stats: Arc<dyn StatsProvider>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            jobs,
            stats,
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
