//! Document store error types.

use thiserror::Error;

use super::path::PathError;

/// Result type for document store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a document store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The request asked for cached data and nothing is cached.
    #[error("Document not in local cache: {0}")]
    CacheMiss(String),

    #[error("Invalid path: {0}")]
    Path(#[from] PathError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error status.
    #[error("Remote store returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The service answered with a payload we could not interpret.
    #[error("Unexpected response: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns true if the data was simply not cached locally.
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, StoreError::CacheMiss(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = StoreError::Api {
            status: 403,
            message: "denied".to_string(),
        };
        assert_eq!(err.to_string(), "Remote store returned status 403: denied");
        assert!(StoreError::CacheMiss("a/b".to_string()).is_cache_miss());
        assert!(!StoreError::protocol("bad").is_cache_miss());
    }
}
