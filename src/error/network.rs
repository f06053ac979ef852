//! Transport-level error details.

use thiserror::Error;

/// Detail enum for [`Error::Network`](super::Error::Network).
///
/// Distinguishes the common transport failure modes so callers and retry
/// policies can tell a refused connection from a protocol-level problem.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NetworkError {
    /// Could not establish a connection to the remote host.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Host name resolution failed.
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    /// The connection was established but broke mid-exchange.
    #[error("I/O error: {0}")]
    Io(String),

    /// The transport produced a response the core could not interpret.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<NetworkError> for super::Error {
    fn from(err: NetworkError) -> Self {
        super::Error::Network(Box::new(err))
    }
}
