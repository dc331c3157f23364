//! Error types for record store operations.

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when talking to the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Fetch-all gave up after exhausting its retry budget.
    ///
    /// Callers must read this as "the store is unreachable", never as "no data".
    #[error("maximum retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: usize, last_error: String },

    /// A single write call was handed more records than the store accepts.
    #[error("batch of {size} records exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Malformed filter predicate.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<HttpError> for StoreError {
    fn from(err: HttpError) -> Self {
        StoreError::Http(err.to_string())
    }
}

impl StoreError {
    /// Create an API error.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether restarting the operation could plausibly succeed.
    ///
    /// Programming and configuration errors are never retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidFilter(_)
                | Self::Config(_)
                | Self::BatchTooLarge { .. }
                | Self::MaxRetriesExceeded { .. }
        )
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which is useful for errors
/// that include multi-line details.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
