//! Shared error taxonomy for integration clients.
//!
//! The core never interprets these beyond passing them through; they exist
//! so every client reports failures in the same closed set of shapes.

use std::time::Duration;

/// Result type for integration operations.
pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// Error types surfaced by issue-tracker, code-host and spec-store clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrationError {
    #[error("Authentication required: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("{service} error: {message} (status: {status})")]
    Other { service: &'static str, status: u16, message: String },
}

impl IntegrationError {
    /// Classify a failed HTTP response into the closed taxonomy.
    ///
    /// `rate_limit_remaining` is the value of the provider's remaining-quota
    /// header, when present; a `403` with zero remaining quota is a rate limit.
    pub fn from_status(
        service: &'static str,
        status: u16,
        rate_limit_remaining: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        match status {
            401 => Self::Auth(message),
            403 if rate_limit_remaining.map(str::trim) == Some("0") => {
                Self::RateLimited { retry_after: None }
            }
            403 => Self::Auth(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited { retry_after: None },
            _ => Self::Other { service, status, message },
        }
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
            || matches!(self, Self::Other { status, .. } if *status >= 500)
    }
}
