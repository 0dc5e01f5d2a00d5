// crates/server/src/lib.rs
//! Proposal-desk server library.
//!
//! Axum HTTP server for the business-development backend's job core: it runs
//! the vectorization migration (which loads historical projects into the
//! vector database) as a single-flight background job, exposes its status for
//! polling, and reports the vector-database collection count.

pub mod config;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ServerConfig;
pub use error::*;
pub use metrics::init_metrics;
pub use routes::api_routes;
pub use state::{AppState, VECTORIZATION_TASK};

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use proposal_desk_jobs::{FileStatusStore, JobRunner, JobStatus, MemoryStatusStore, StatusStore};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Status of the vectorization task before its first run.
pub fn initial_vectorization_status() -> JobStatus {
    JobStatus::idle("Vectorization has not been run yet")
}

/// Build the job runner with the vectorization task registered.
///
/// Uses a file-backed status store when `STATUS_FILE` is configured. Must be
/// called inside a tokio runtime.
pub fn build_job_runner(config: &ServerConfig) -> anyhow::Result<JobRunner> {
    let store: Arc<dyn StatusStore> = match &config.status_file {
        Some(path) => Arc::new(
            FileStatusStore::open(path, initial_vectorization_status())
                .with_context(|| format!("opening status file {}", path.display()))?,
        ),
        None => Arc::new(MemoryStatusStore::new(initial_vectorization_status())),
    };

    let runner = JobRunner::builder()
        .task(VECTORIZATION_TASK, Arc::new(config.vectorize.to_task()), store)
        .build()?;
    Ok(runner)
}

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, vectorization trigger/status, vector stats, metrics)
/// - CORS limited to `cors_origins` (any origin when the list is empty)
/// - Request tracing
pub fn create_app(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .merge(api_routes(state))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let origin = if allowed.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, InstantTask};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    /// Helper to make a GET request to the app.
    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();

        (status, body_str)
    }

    fn app() -> Router {
        create_app(test_state(InstantTask::ok()), &["http://localhost:3000".to_string()])
    }

    // ========================================================================
    // Health Endpoint Tests
    // ========================================================================

    #[tokio::test]
    async fn test_health_endpoint_response_structure() {
        let (status, body) = get(app(), "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["version"].is_string());
        assert!(json["uptime_secs"].is_number());
    }

    // ========================================================================
    // CORS Tests
    // ========================================================================

    #[tokio::test]
    async fn test_cors_allows_frontend_origin() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/trigger-vectorization")
                    .header("Origin", "http://localhost:3000")
                    .header("Access-Control-Request-Method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let allow_origin = response.headers().get("access-control-allow-origin");
        assert_eq!(allow_origin.unwrap(), "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_cors_rejects_unknown_origin() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("Origin", "http://evil.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn test_cors_any_origin_when_unconfigured() {
        let app = create_app(test_state(InstantTask::ok()), &[]);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("Origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get("access-control-allow-origin").unwrap(), "*");
    }

    // ========================================================================
    // 404 Tests
    // ========================================================================

    #[tokio::test]
    async fn test_404_for_unknown_route() {
        let (status, _body) = get(app(), "/api/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_404_for_non_api_path() {
        let (status, _body) = get(app(), "/health").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ========================================================================
    // Job Runner Wiring
    // ========================================================================

    #[tokio::test]
    async fn test_build_job_runner_memory_store() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        let runner = build_job_runner(&config).unwrap();
        assert_eq!(runner.task_names(), vec![VECTORIZATION_TASK]);
        assert_eq!(
            runner.get_status(VECTORIZATION_TASK).unwrap(),
            initial_vectorization_status()
        );
    }

    #[tokio::test]
    async fn test_build_job_runner_recovers_persisted_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectorization.json");
        let running = JobStatus::running(chrono::Utc::now(), "running");
        std::fs::write(&path, serde_json::to_string(&running).unwrap()).unwrap();

        let path_str = path.display().to_string();
        let config = ServerConfig::from_lookup(|k| (k == "STATUS_FILE").then(|| path_str.clone())).unwrap();
        let runner = build_job_runner(&config).unwrap();

        let status = runner.get_status(VECTORIZATION_TASK).unwrap();
        assert_eq!(status.state, proposal_desk_jobs::JobState::Error);
        assert_eq!(status.last_run, running.last_run);
    }
}
