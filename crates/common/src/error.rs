//! Unified error type for the opportunity pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transient fetch failure: {0}")]
    TransientFetch(String),

    #[error("fetch failed (status={status}): {body}")]
    Fetch { status: u16, body: String },

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM extraction failed: {0}")]
    Extraction(String),

    #[error("item processing failed for {key}: {message}")]
    ItemProcessing { key: String, message: String },

    #[error("profile rejected: {0}")]
    Profile(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether a retry with backoff is worthwhile. Timeouts, 5xx and 429
    /// qualify; other HTTP statuses and local failures do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::TransientFetch(_) | Error::Timeout(_) => true,
            Error::Fetch { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
