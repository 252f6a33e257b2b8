//! Platform API error types.
//!
//! Failures are categorized for retry decisions:
//!
//! - **Transient** errors are retriable (5xx, rate limits, network timeouts)
//! - **Auth** errors mean credentials were rejected; retrying the same call is
//!   pointless, and repeated failures at login are fatal for the process
//! - **Permanent** errors require operator attention (most other 4xx)

use std::fmt;
use thiserror::Error;

/// The kind of platform error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    /// Safe to retry with backoff: 5xx, 429, connection failures, timeouts.
    Transient,

    /// Credentials rejected (401/403). Not retriable with the same token.
    Auth,

    /// Everything else: malformed requests, missing resources.
    Permanent,
}

impl PlatformErrorKind {
    /// Returns true if this error is worth retrying with backoff.
    pub fn is_retriable(&self) -> bool {
        matches!(self, PlatformErrorKind::Transient)
    }
}

/// A platform API error with categorization for retry decisions.
#[derive(Debug, Error)]
pub struct PlatformError {
    /// The kind of error (transient, auth, or permanent).
    pub kind: PlatformErrorKind,

    /// The HTTP status code, if available.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying HTTP client error, if available.
    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "platform error (HTTP {}): {}", code, self.message),
            None => write!(f, "platform error: {}", self.message),
        }
    }
}

impl PlatformError {
    /// Creates a transient error without an underlying source.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: PlatformErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a permanent error without an underlying source.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: PlatformErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates an auth error without an underlying source.
    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: PlatformErrorKind::Auth,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes an HTTP status code into an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => PlatformErrorKind::Auth,
            429 => PlatformErrorKind::Transient,
            s if s >= 500 => PlatformErrorKind::Transient,
            _ => PlatformErrorKind::Permanent,
        };
        Self {
            kind,
            status_code: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if this error is worth retrying.
    pub fn is_retriable(&self) -> bool {
        self.kind.is_retriable()
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        // Connection-level failures and timeouts are transient; a status error
        // is categorized by its code.
        if let Some(status) = e.status() {
            let mut err = PlatformError::from_status(status.as_u16(), e.to_string());
            err.source = Some(e);
            err
        } else {
            Self {
                kind: PlatformErrorKind::Transient,
                status_code: None,
                message: e.to_string(),
                source: Some(e),
            }
        }
    }
}
