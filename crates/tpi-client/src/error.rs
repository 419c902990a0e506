//! Error types for BMC client operations

use thiserror::Error;

/// Result type alias for BMC client operations
pub type Result<T> = std::result::Result<T, TpiClientError>;

/// Errors that can occur during BMC client operations
///
/// Every call either fully succeeds or fails with one of these; there is
/// no retry and no partial-failure state.
#[derive(Error, Debug)]
pub enum TpiClientError {
    /// HTTP request failed; the transport's own error, passed through
    /// unchanged
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid endpoint URL
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// BMC answered with a non-success HTTP status
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Response body was not the expected JSON envelope
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl TpiClientError {
    /// Create a server error from status code and message
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }
}
