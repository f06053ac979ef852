//! courier-core: an extensible HTTP client core.
//!
//! Builds typed, composable HTTP calls on top of an injected transport:
//! a fluent request builder producing immutable snapshots, a pluggable
//! serialization layer negotiated by media type, an ordered
//! filter/interceptor pipeline around every request and response, and a
//! dispatcher handling delay, retry, timeout, polling and cancellation
//! behind a single-settlement promise.
//!
//! # Features
//!
//! - **Typed calls**: declare the payload type once; serialization and
//!   deserialization are resolved from the registry by media type with
//!   wildcard precedence.
//! - **Composable pipeline**: filters (full access) and interceptors
//!   (headers/payload) run in registration order on both directions.
//! - **Async dispatch**: built on tokio; every request settles exactly
//!   once through its [`deferred::Promise`].
//! - **Transport-agnostic**: anything implementing
//!   [`transport::Transport`] plugs in; a reqwest implementation ships.
//!
//! # Example
//!
//! ```rust,no_run
//! use courier_core::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Person {
//!     name: String,
//! }
//!
//! # fn main() -> courier_core::error::Result<()> {
//! let session = Session::new(ReqwestTransport::new()?);
//! session.register_serdes::<Person, _>(JsonSerdes::new())?;
//!
//! session
//!     .req(Method::POST, "http://localhost:8080/people")?
//!     .content_type("application/json")
//!     .payload(Person { name: "Ada".into() })
//!     .send::<Person>()
//!     .on_success(|response| println!("created: {:?}", response.payload()));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]

// Re-exports of external dependencies that appear in the public API.
pub use http;
pub use serde;
pub use serde_json;
pub use url;

pub mod auth;
pub mod deferred;
pub mod error;
pub mod filter;
pub mod headers;
pub mod interceptor;
pub mod logging;
pub mod media;
pub mod payload;
pub mod request;
pub mod response;
pub mod retry;
pub mod serialization;
pub mod session;
pub mod store;
pub mod transport;

mod dispatcher;
mod processor;

pub use deferred::{Deferred, HttpConnection, Progress, Promise, Rejection, StatusMatcher};
pub use error::{ContextExt, Error, NetworkError, Result, SerializationError};
pub use filter::{RequestFilter, ResponseFilter};
pub use headers::{Header, Headers};
pub use interceptor::{RequestInterceptor, ResponseInterceptor};
pub use media::{MediaType, MediaTypePattern};
pub use payload::{RequestPayload, SerializedPayload, TypedPayload};
pub use processor::{Interruption, ProcessContext};
pub use request::{
    MutableRequest, PollingOptions, PollingStrategy, RequestBuilder, RequestSnapshot,
    SerializedRequest,
};
pub use response::{MutableResponse, RawResponse, Response, StatusFamily};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use session::{Session, SessionConfig};
pub use store::Store;

// Re-export the cancellation primitive used by connection handles.
pub use tokio_util::sync::CancellationToken;

/// Prelude for convenient imports.
///
/// ```rust
/// use courier_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::auth::{Auth, BasicAuth, BearerAuth, NoAuth};
    pub use crate::deferred::{Progress, Promise, Rejection};
    pub use crate::error::{ContextExt, Error, Result};
    pub use crate::filter::{RequestFilter, ResponseFilter};
    pub use crate::headers::Headers;
    pub use crate::interceptor::{RequestInterceptor, ResponseInterceptor};
    pub use crate::logging::{init_logging, try_init_logging, LogConfig, LogFormat, LogLevel};
    pub use crate::media::MediaType;
    pub use crate::payload::SerializedPayload;
    pub use crate::request::{PollingStrategy, RequestBuilder, RequestSnapshot};
    pub use crate::response::{Response, StatusFamily};
    pub use crate::retry::{BackoffStrategy, RetryPolicy};
    pub use crate::serialization::{FormData, JsonSerdes, TextSerdes};
    pub use crate::session::{Session, SessionConfig};
    pub use crate::store::Store;
    pub use crate::transport::{ReqwestTransport, Transport, TransportConfig};
    pub use http::{Method, StatusCode};
    pub use serde::{Deserialize, Serialize};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
