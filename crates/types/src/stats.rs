// crates/types/src/stats.rs
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Document count of the vector-database collection the vectorization job
/// fills. Refreshed by the frontend after a run reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../../frontend/src/types/generated/")]
pub struct CollectionStats {
    pub collection_name: String,
    #[ts(type = "number")]
    pub document_count: u64,
    /// `"connected"` or `"error"`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectionStats {
    pub fn connected(collection_name: impl Into<String>, document_count: u64) -> Self {
        Self {
            collection_name: collection_name.into(),
            document_count,
            status: "connected".to_string(),
            error: None,
        }
    }

    /// Stats for an unreachable collection: zero documents plus the error text.
    pub fn unavailable(collection_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            document_count: 0,
            status: "error".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connected_omits_error_field() {
        let json = serde_json::to_string(&CollectionStats::connected("projects", 42)).unwrap();
        assert_eq!(
            json,
            r#"{"collection_name":"projects","document_count":42,"status":"connected"}"#
        );
    }

    #[test]
    fn test_unavailable_reports_zero_documents() {
        let stats = CollectionStats::unavailable("projects", "connection refused");
        assert!(!stats.is_connected());
        assert_eq!(stats.document_count, 0);
        assert_eq!(stats.error.as_deref(), Some("connection refused"));
    }
}
