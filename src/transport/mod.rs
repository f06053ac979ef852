//! The wire transport boundary.
//!
//! The core never opens sockets; it hands a [`SerializedRequest`] to a
//! [`Transport`] and gets back a [`RawResponse`] (or an error), exactly
//! once per send. Timeout enforcement, retries and cancellation wrap the
//! transport from the dispatcher side. A reqwest-backed implementation
//! ships in [`ReqwestTransport`]; tests script a [`MockTransport`].

mod reqwest_transport;

#[cfg(any(test, feature = "mock-transport", debug_assertions))]
mod mock;

pub use reqwest_transport::{ReqwestTransport, TransportConfig};

#[cfg(any(test, feature = "mock-transport", debug_assertions))]
pub use mock::MockTransport;

use crate::deferred::Progress;
use crate::error::Result;
use crate::request::SerializedRequest;
use crate::response::RawResponse;
use async_trait::async_trait;
use std::sync::Arc;

/// Forwards transfer progress from a transport to the in-flight
/// deferred. Cheap to clone; a disabled sink drops everything.
#[derive(Clone, Default)]
pub struct ProgressSink {
    download: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
    upload: Option<Arc<dyn Fn(Progress) + Send + Sync>>,
}

impl ProgressSink {
    /// A sink that ignores all events.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        download: Arc<dyn Fn(Progress) + Send + Sync>,
        upload: Arc<dyn Fn(Progress) + Send + Sync>,
    ) -> Self {
        Self {
            download: Some(download),
            upload: Some(upload),
        }
    }

    /// Reports download progress.
    pub fn download(&self, progress: Progress) {
        if let Some(cb) = &self.download {
            cb(progress);
        }
    }

    /// Reports upload progress.
    pub fn upload(&self, progress: Progress) {
        if let Some(cb) = &self.upload {
            cb(progress);
        }
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink")
            .field("enabled", &self.download.is_some())
            .finish()
    }
}

/// Sends one serialized request over the wire.
///
/// Implementations must complete exactly once per call, with a response
/// or an error, and should forward transfer progress through the sink.
/// They do not enforce the request timeout; the dispatcher wraps the
/// call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the exchange.
    async fn send(&self, request: &SerializedRequest, progress: ProgressSink)
        -> Result<RawResponse>;
}
