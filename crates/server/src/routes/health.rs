// crates/server/src/routes/health.rs
//! Liveness endpoint.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

const HEALTHY: &str = "healthy";
const RUNNING_MESSAGE: &str = "Proposal desk API is running";

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
}

impl Health {
    fn report(state: &AppState) -> Self {
        Self {
            status: HEALTHY,
            message: RUNNING_MESSAGE,
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: state.uptime_secs(),
        }
    }
}

/// GET /api/health - Always `healthy` while the process serves requests.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health::report(&state))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}
