//! API route handlers for the proposal-desk server.

pub mod health;
pub mod metrics;
pub mod stats;
pub mod vectorization;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/trigger-vectorization - Start the vectorization migration
/// - GET  /api/vectorization-status - Latest vectorization status record
/// - GET  /api/vectorization-status/stream - SSE stream of status transitions
/// - GET  /api/vector-stats - Document count of the vector-database collection
/// - GET  /metrics - Prometheus metrics (no /api prefix)
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", vectorization::router())
        .nest("/api", stats::router())
        .merge(metrics::router())
        .with_state(state)
}
