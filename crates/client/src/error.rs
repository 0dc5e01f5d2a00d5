// crates/client/src/error.rs
use thiserror::Error;

/// Failures talking to the server. Job outcomes are not errors: they come
/// back as [`crate::PollOutcome`] values.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP {code} from {url}: {body}")]
    UnexpectedStatus { url: String, code: u16, body: String },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL: {0}")]
    BaseUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unexpected_status_display() {
        let err = ClientError::UnexpectedStatus {
            url: "http://localhost:8000/api/vectorization-status".to_string(),
            code: 500,
            body: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected HTTP 500 from http://localhost:8000/api/vectorization-status: boom"
        );
    }
}
