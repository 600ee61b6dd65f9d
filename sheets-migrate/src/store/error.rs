use thiserror::Error;

use crate::api::resilience::RetryableError;

/// Errors returned by store backends.
///
/// `Unavailable` covers network trouble, timeouts, rate limiting and 5xx
/// responses and is retried. Everything else fails the call immediately.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Map an HTTP status and response body to an error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 408 || status == 429 || status >= 500 {
            StoreError::Unavailable(format!("HTTP {}: {}", status, message))
        } else {
            StoreError::Rejected { status, message }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl RetryableError for StoreError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            StoreError::Unavailable(err.to_string())
        } else if let Some(status) = err.status() {
            StoreError::from_status(status.as_u16(), err.to_string())
        } else {
            StoreError::InvalidData(err.to_string())
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(ref db) if db.message().contains("database is locked") => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}
