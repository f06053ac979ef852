//! Request model: immutable snapshots and their processing forms.
//!
//! A request exists in three forms over its life:
//!
//! 1. [`RequestBuilder`](crate::request::RequestBuilder): mutable, owned
//!    by the caller until built.
//! 2. [`RequestSnapshot`]: immutable, dispatch-ready. Never mutates once
//!    dispatch begins; only its shared polling state can be flipped off.
//! 3. [`MutableRequest`]: the controlled processing decorator the
//!    outbound pipeline works on, rebuilt fresh for every tick from the
//!    snapshot; frozen into a [`SerializedRequest`] for the transport.

mod builder;
mod polling;

pub use builder::RequestBuilder;
pub use polling::{PollingOptions, PollingStrategy};

use crate::auth::Auth;
use crate::error::Result;
use crate::headers::Headers;
use crate::media::MediaType;
use crate::payload::{RequestPayload, SerializedPayload};
use crate::retry::RetryPolicy;
use crate::store::Store;
use http::Method;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// An immutable, fully-built request ready for dispatch.
#[derive(Clone)]
pub struct RequestSnapshot {
    method: Method,
    uri: Url,
    headers: Headers,
    timeout: Option<Duration>,
    delay: Option<Duration>,
    polling: PollingOptions,
    auth: Arc<dyn Auth>,
    retry: Option<RetryPolicy>,
    payload: RequestPayload,
    store: Store,
}

impl RequestSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        method: Method,
        uri: Url,
        headers: Headers,
        timeout: Option<Duration>,
        delay: Option<Duration>,
        polling: PollingOptions,
        auth: Arc<dyn Auth>,
        retry: Option<RetryPolicy>,
        payload: RequestPayload,
        store: Store,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            timeout,
            delay,
            polling,
            auth,
            retry,
            payload,
            store,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(method: Method, uri: Url) -> Self {
        Self::new(
            method,
            uri,
            Headers::new(),
            None,
            None,
            PollingOptions::inactive(),
            Arc::new(crate::auth::NoAuth),
            None,
            RequestPayload::Absent,
            Store::new(),
        )
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URI.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// The request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The per-request timeout, if set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The pre-send delay, if set.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// The polling configuration.
    pub fn polling(&self) -> &PollingOptions {
        &self.polling
    }

    /// Stops the polling chain this snapshot belongs to.
    pub fn stop_polling(&self) {
        self.polling.stop();
    }

    /// The authentication hook.
    pub fn auth(&self) -> &Arc<dyn Auth> {
        &self.auth
    }

    /// The retry policy, if set.
    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// The payload in its current form.
    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    /// Produces an independent snapshot: headers, URI and polling options
    /// are cloned (with fresh polling state), the store reference is
    /// shared.
    #[must_use]
    pub fn copy(&self) -> Self {
        Self {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            timeout: self.timeout,
            delay: self.delay,
            polling: self.polling.detach(),
            auth: Arc::clone(&self.auth),
            retry: self.retry.clone(),
            payload: self.payload.clone(),
            store: self.store.clone(),
        }
    }
}

impl fmt::Debug for RequestSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSnapshot")
            .field("method", &self.method)
            .field("uri", &self.uri.as_str())
            .field("headers", &self.headers.len())
            .field("timeout", &self.timeout)
            .field("delay", &self.delay)
            .field("polling", &self.polling)
            .finish()
    }
}

/// The in-flight, fully mutable form a request takes while the outbound
/// pipeline runs. Filters get the whole thing; interceptors get a
/// narrowed view of it.
pub struct MutableRequest {
    method: Method,
    uri: Url,
    headers: Headers,
    timeout: Option<Duration>,
    delay: Option<Duration>,
    polling: PollingOptions,
    auth: Arc<dyn Auth>,
    retry: Option<RetryPolicy>,
    payload: RequestPayload,
    store: Store,
}

impl MutableRequest {
    /// Builds the processing form for one dispatch cycle. `store` is the
    /// cycle's volatile leaf over the session tier.
    pub(crate) fn from_snapshot(snapshot: &RequestSnapshot, store: Store) -> Self {
        Self {
            method: snapshot.method.clone(),
            uri: snapshot.uri.clone(),
            headers: snapshot.headers.clone(),
            timeout: snapshot.timeout,
            delay: snapshot.delay,
            polling: snapshot.polling.clone(),
            auth: Arc::clone(&snapshot.auth),
            retry: snapshot.retry.clone(),
            payload: snapshot.payload.clone(),
            store,
        }
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Replaces the HTTP method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The target URI.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// Replaces the target URI.
    pub fn set_uri(&mut self, uri: Url) {
        self.uri = uri;
    }

    /// The request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to the headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Replaces the timeout.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// The pre-send delay.
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// The polling configuration.
    pub fn polling(&self) -> &PollingOptions {
        &self.polling
    }

    /// Stops the polling chain from inside the pipeline.
    pub fn stop_polling(&self) {
        self.polling.stop();
    }

    /// The authentication hook.
    pub fn auth(&self) -> &Arc<dyn Auth> {
        &self.auth
    }

    /// Replaces the authentication hook.
    pub fn set_auth(&mut self, auth: Arc<dyn Auth>) {
        self.auth = auth;
    }

    /// The retry policy.
    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// The payload in its current form.
    pub fn payload(&self) -> &RequestPayload {
        &self.payload
    }

    /// Mutable access to the payload.
    pub fn payload_mut(&mut self) -> &mut RequestPayload {
        &mut self.payload
    }

    /// Replaces the payload.
    pub fn set_payload(&mut self, payload: RequestPayload) {
        self.payload = payload;
    }

    /// The cycle store (volatile tier over the session tier).
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// The declared Content-Type, parsed; `*/*` when absent.
    pub fn content_type(&self) -> Result<MediaType> {
        parse_media_header(self.headers.get("Content-Type"))
    }

    /// The declared Accept type, parsed; `*/*` when absent. Only the
    /// first element of a multi-valued Accept participates in serdes
    /// lookup.
    pub fn accept(&self) -> Result<MediaType> {
        let first = self
            .headers
            .get("Accept")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        parse_media_header(first)
    }

    /// Freezes into the immutable wire-ready form handed to the
    /// transport.
    pub(crate) fn freeze(&self) -> SerializedRequest {
        SerializedRequest {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            timeout: self.timeout,
            body: self.payload.wire(),
        }
    }
}

fn parse_media_header(value: Option<&str>) -> Result<MediaType> {
    match value {
        Some(v) => v.parse::<MediaType>(),
        None => Ok(MediaType::any()),
    }
}

/// The immutable wire-ready request handed to the transport.
#[derive(Debug, Clone)]
pub struct SerializedRequest {
    method: Method,
    uri: Url,
    headers: Headers,
    timeout: Option<Duration>,
    body: SerializedPayload,
}

impl SerializedRequest {
    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URI.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// The final headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The configured timeout, for transports that enforce their own.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The wire body.
    pub fn body(&self) -> &SerializedPayload {
        &self.body
    }
}
