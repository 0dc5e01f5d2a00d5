//! Vector-database statistics endpoint.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use proposal_desk_types::CollectionStats;

use crate::state::AppState;

/// GET /api/vector-stats - Document count of the vectorized collection.
///
/// Always 200: an unreachable database is reported in the body as
/// `status: "error"`.
pub async fn vector_stats(State(state): State<Arc<AppState>>) -> Json<CollectionStats> {
    Json(state.stats.collection_stats().await)
}

/// Create the stats routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/vector-stats", get(vector_stats))
}
