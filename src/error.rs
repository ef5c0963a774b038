//! Error types for the record store.

use thiserror::Error;

/// Main error type for store and adapter operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store missing adapter: a remote request needs an adapter with a `fetch` method")]
    MissingAdapter,

    #[error("No endpoints registered for type: {0}")]
    EndpointNotRegistered(String),

    #[error("Request to {url} failed with status {status}")]
    Transport {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Failed to parse response body: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl StoreError {
    /// Status code of the response that caused this error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this error came from a response body that failed to decode.
    pub fn is_parse(&self) -> bool {
        matches!(self, StoreError::Parse(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Parse(e.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Http(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_exposes_status() {
        let error = StoreError::Transport {
            status: 403,
            url: "http://x/person".to_string(),
            body: String::new(),
        };

        assert_eq!(error.status(), Some(403));
        assert!(!error.is_parse());
        assert_eq!(
            error.to_string(),
            "Request to http://x/person failed with status 403"
        );
    }

    #[test]
    fn test_json_error_maps_to_parse() {
        let err = serde_json::from_str::<serde_json::Value>("}{bad").unwrap_err();
        let error = StoreError::from(err);

        assert!(error.is_parse());
        assert_eq!(error.status(), None);
    }
}
