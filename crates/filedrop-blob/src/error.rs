//! Error types for the blob store adapter

use thiserror::Error;

/// Errors surfaced by a [`BlobStore`](crate::services::BlobStore)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Credential unavailable: {0}")]
    Credential(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Storage returned status {status} ({code}): {message}")]
    Backend {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Invalid response from storage: {0}")]
    InvalidResponse(String),

    #[error("Injected fault: {0}")]
    Injected(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Map a transport failure, keeping timeouts distinguishable
    pub(crate) fn from_reqwest(error: reqwest::Error, timeout_secs: u64) -> Self {
        if error.is_timeout() {
            StoreError::Timeout(timeout_secs)
        } else {
            StoreError::Request(error.to_string())
        }
    }
}
