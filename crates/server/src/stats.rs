// crates/server/src/stats.rs
//! Vector-database collection statistics.
//!
//! The frontend refreshes these after a vectorization run finishes. Lookups
//! never fail outward: an unreachable database is reported as
//! `status: "error"` with a zero count, mirroring how the stats panel renders
//! it.

use std::time::Duration;

use async_trait::async_trait;
use proposal_desk_types::CollectionStats;
use serde::Deserialize;

/// Source of collection statistics.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    async fn collection_stats(&self) -> CollectionStats;
}

/// Reads the document count of one Chroma collection over its HTTP API.
pub struct ChromaStatsProvider {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

impl ChromaStatsProvider {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client for Chroma");
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, String> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.get(&url).header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            req = req.header("X-Chroma-Token", key);
        }

        let resp = req.send().await.map_err(|e| format!("Network error: {e}"))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("Chroma returned {status}: {}", body.trim()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| format!("Invalid response from Chroma: {e}"))
    }

    async fn count(&self) -> Result<u64, String> {
        let info: CollectionInfo = self
            .get_json(&format!("/api/v1/collections/{}", self.collection))
            .await?;
        self.get_json(&format!("/api/v1/collections/{}/count", info.id))
            .await
    }
}

#[async_trait]
impl StatsProvider for ChromaStatsProvider {
    async fn collection_stats(&self) -> CollectionStats {
        match self.count().await {
            Ok(count) => CollectionStats::connected(&self.collection, count),
            Err(e) => {
                tracing::error!(collection = %self.collection, error = %e, "Error getting collection stats");
                CollectionStats::unavailable(&self.collection, e)
            }
        }
    }
}
