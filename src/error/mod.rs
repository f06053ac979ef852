//! Error handling for courier-core.
//!
//! One crate-wide [`Error`] enum covers the whole fault taxonomy:
//!
//! ```text
//! Error
//! ├── Configuration  - programmer error detected at configuration time
//! ├── Serialization  - no matching serdes, or a codec failure (via SerializationError)
//! ├── Network        - transport layer faults (via NetworkError)
//! ├── Timeout        - distinguished rejection carrying the configured timeout
//! ├── Cancelled      - the caller gave up on the in-flight request
//! └── Context        - error with an attached context message
//! ```
//!
//! The split matters to callers: `Configuration` and `Serialization` faults
//! are synchronous, non-recoverable programmer errors, while `Network` and
//! `Timeout` only ever surface as promise rejections. `is_retryable` drives
//! the retry policy; `as_timeout` lets callers special-case timeouts without
//! pattern-matching through context layers.
//!
//! # Example
//!
//! ```rust
//! use courier_core::error::{ContextExt, Error, Result};
//!
//! fn lookup(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(Error::configuration("serializer name cannot be empty"));
//!     }
//!     Ok(())
//! }
//!
//! let err = lookup("").unwrap_err().context("registering serdes");
//! assert!(err.report().contains("serializer name cannot be empty"));
//! ```

mod context;
mod network;
mod serialization;

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

pub use context::ContextExt;
pub use network::NetworkError;
pub use serialization::{SerializationError, SerializationErrorKind};

/// Result type alias for all courier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The primary error type of the crate.
///
/// Large variants are boxed to keep the enum small; message-only variants
/// use `Cow<'static, str>` so static messages allocate nothing.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration detected at the point of configuration.
    ///
    /// Conflicting media-type shortcuts vs. explicit headers, malformed
    /// media-type patterns, invalid session options. Never recoverable at
    /// runtime.
    #[error("Configuration error: {0}")]
    Configuration(Cow<'static, str>),

    /// Serialization layer fault: no matching (de)serializer for the
    /// requested type and media type, or the codec itself failed.
    #[error("Serialization error: {0}")]
    Serialization(Box<SerializationError>),

    /// Transport layer fault. Only ever surfaces as a promise rejection.
    #[error("Network error: {0}")]
    Network(Box<NetworkError>),

    /// The request did not complete within the configured timeout.
    ///
    /// Carries the configured value so retry policies can reason about it.
    #[error("Timeout: request did not complete within {timeout:?}")]
    Timeout {
        /// The timeout that was configured on the request.
        timeout: Duration,
    },

    /// The request was cancelled through its connection handle.
    #[error("Cancelled: {0}")]
    Cancelled(Cow<'static, str>),

    /// Error with additional context, preserving the chain.
    #[error("{context}")]
    Context {
        /// What was being done when the error occurred.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Creates a configuration error.
    pub fn configuration(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a serialization error from its detail struct.
    pub fn serialization(detail: SerializationError) -> Self {
        Self::Serialization(Box::new(detail))
    }

    /// Creates a network error from a message.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(Box::new(NetworkError::ConnectionFailed(msg.into())))
    }

    /// Creates a timeout error carrying the configured timeout.
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// Creates a cancellation error.
    pub fn cancelled(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Attaches context to an existing error.
    #[must_use]
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the root cause, skipping context layers.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Whether a retry policy may re-attempt after this error.
    ///
    /// Network and timeout faults are retryable; configuration,
    /// serialization and cancellation faults are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.root_cause() {
            Error::Network(_) | Error::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns the configured timeout if this is a timeout fault
    /// (penetrates context layers).
    #[must_use]
    pub fn as_timeout(&self) -> Option<Duration> {
        match self.root_cause() {
            Error::Timeout { timeout } => Some(*timeout),
            _ => None,
        }
    }

    /// Returns the serialization detail if this is a serialization fault
    /// (penetrates context layers).
    #[must_use]
    pub fn as_serialization(&self) -> Option<&SerializationError> {
        match self.root_cause() {
            Error::Serialization(detail) => Some(detail),
            _ => None,
        }
    }

    /// Returns the message if this is a configuration fault
    /// (penetrates context layers).
    #[must_use]
    pub fn as_configuration(&self) -> Option<&str> {
        match self.root_cause() {
            Error::Configuration(msg) => Some(msg.as_ref()),
            _ => None,
        }
    }

    /// Whether this error is a cancellation (penetrates context layers).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_cause(), Error::Cancelled(_))
    }

    /// Generates a report with the full error chain.
    #[must_use]
    pub fn report(&self) -> String {
        let mut report = self.to_string();
        let mut current: Option<&(dyn StdError + 'static)> = self.source();
        while let Some(err) = current {
            let _ = write!(report, "\nCaused by: {err}");
            current = err.source();
        }
        report
    }
}
