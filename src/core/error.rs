use crate::services::StoreError;
use thiserror::Error;

/// Errors returned to callers of the search engine
///
/// A search either completes with a consistent result set or fails with one of
/// these; no partial results are ever returned.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Rejected before any store query was issued
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backing store failed or timed out
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl SearchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SearchError::InvalidInput(message.into())
    }

    /// Only transient store failures (connection, query, timeout) are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::InvalidInput(_) => false,
            SearchError::StoreUnavailable(e) => e.is_transient(),
        }
    }
}
