//! The classifiable failure type.

use thiserror::Error;

/// A failure raised by one attempt of an operation.
///
/// Collaborators translate their native errors into this shape at the
/// boundary so the classifier can inspect them. The original cause is kept
/// reachable through [`std::error::Error::source`]; classification walks
/// that chain rather than relying on the top-level variant alone.
#[derive(Debug, Error)]
pub enum RequestError {
    /// HTTP-style status failure (500, 502, 503, ...).
    #[error("HTTP error {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics and message matching.
        body: String,
    },

    /// The attempt timed out or was cancelled by a deadline.
    #[error("request timed out")]
    Timeout,

    /// The remote host actively refused the connection.
    #[error("connection refused")]
    ConnectionRefused,

    /// Name resolution failed for the target host.
    #[error("host not found")]
    HostNotFound,

    /// Any other failure. Its cause chain is still walked during
    /// classification.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RequestError {
    /// Create an HTTP status failure.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    /// Get the HTTP status if this is a status failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for one attempt of an operation.
pub type AttemptResult<T> = Result<T, RequestError>;
