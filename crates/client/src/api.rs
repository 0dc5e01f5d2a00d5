// crates/client/src/api.rs
//! HTTP access to the vectorization endpoints.

use std::time::Duration;

use async_trait::async_trait;
use proposal_desk_types::{CollectionStats, JobStatus, TriggerResponse};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// The server operations the client depends on.
#[async_trait]
pub trait VectorizationApi: Send + Sync {
    /// Request a run. Rejected and unschedulable runs are `Ok` responses.
    async fn trigger(&self) -> Result<TriggerResponse, ClientError>;

    async fn status(&self) -> Result<JobStatus, ClientError>;

    async fn stats(&self) -> Result<CollectionStats, ClientError>;
}

/// [`VectorizationApi`] over reqwest.
pub struct HttpVectorizationApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpVectorizationApi {
    /// `base_url` is the server root, e.g. `http://localhost:8000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::BaseUrl(base_url));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|source| ClientError::Http {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    /// Decode the body when the status code is one of `accepted`.
    async fn decode<T: DeserializeOwned>(
        url: String,
        resp: reqwest::Response,
        accepted: &[StatusCode],
    ) -> Result<T, ClientError> {
        let code = resp.status();
        let body = resp.text().await.map_err(|source| ClientError::Http {
            url: url.clone(),
            source,
        })?;
        if !accepted.contains(&code) {
            return Err(ClientError::UnexpectedStatus {
                url,
                code: code.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|source| ClientError::Decode { url, source })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: url.clone(),
                source,
            })?;
        Self::decode(url, resp, &[StatusCode::OK]).await
    }
}

#[async_trait]
impl VectorizationApi for HttpVectorizationApi {
    async fn trigger(&self) -> Result<TriggerResponse, ClientError> {
        let url = self.url("/trigger-vectorization");
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|source| ClientError::Http {
                url: url.clone(),
                source,
            })?;
        Self::decode(
            url,
            resp,
            &[
                StatusCode::OK,
                StatusCode::ACCEPTED,
                StatusCode::CONFLICT,
                StatusCode::SERVICE_UNAVAILABLE,
            ],
        )
        .await
    }

    async fn status(&self) -> Result<JobStatus, ClientError> {
        self.get_json("/vectorization-status").await
    }

    async fn stats(&self) -> Result<CollectionStats, ClientError> {
        self.get_json("/vector-stats").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proposal_desk_types::{JobState, TriggerStatus};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_rejects_base_url_without_scheme() {
        assert!(matches!(
            HttpVectorizationApi::new("localhost:8000"),
            Err(ClientError::BaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_trigger_accepts_conflict_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/trigger-vectorization"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "status": "rejected",
                "message": "Vectorization already in progress. Please wait for it to complete."
            })))
            .mount(&server)
            .await;

        let api = HttpVectorizationApi::new(format!("{}/", server.uri())).unwrap();
        let resp = api.trigger().await.unwrap();
        assert_eq!(resp.status, TriggerStatus::Rejected);
    }

    #[tokio::test]
    async fn test_status_decodes_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/vectorization-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "running",
                "last_run": "2026-03-01T09:30:00Z",
                "message": "Task 'vectorization' is running"
            })))
            .mount(&server)
            .await;

        let api = HttpVectorizationApi::new(server.uri()).unwrap();
        let status = api.status().await.unwrap();
        assert_eq!(status.state, JobState::Running);
        assert!(status.last_run.is_some());
    }

    #[tokio::test]
    async fn test_status_server_error_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/vectorization-status"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let api = HttpVectorizationApi::new(server.uri()).unwrap();
        match api.status().await {
            Err(ClientError::UnexpectedStatus { code, body, .. }) => {
                assert_eq!(code, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stats_decodes_connected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/vector-stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "collection_name": "projects",
                "document_count": 42,
                "status": "connected"
            })))
            .mount(&server)
            .await;

        let api = HttpVectorizationApi::new(server.uri()).unwrap();
        assert_eq!(
            api.stats().await.unwrap(),
            CollectionStats::connected("projects", 42)
        );
    }
}
