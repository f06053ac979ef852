//! Response model: raw, in-process and typed forms.
//!
//! The transport produces a [`RawResponse`]; the inbound pipeline works
//! on a [`MutableResponse`]; successful deserialization yields a
//! [`Response<T>`] that still exposes the frozen raw form for status and
//! header access.

use crate::headers::Headers;
use crate::media::MediaType;
use crate::payload::SerializedPayload;
use crate::store::Store;
use http::StatusCode;
use std::sync::Arc;

/// Family of an HTTP status code, used for `2xx` gating and for
/// family-wide status callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFamily {
    /// `1xx` status codes.
    Informational,
    /// `2xx` status codes.
    Successful,
    /// `3xx` status codes.
    Redirection,
    /// `4xx` status codes.
    ClientError,
    /// `5xx` status codes.
    ServerError,
    /// Anything else.
    Other,
}

impl StatusFamily {
    /// The family of the given status code.
    pub fn of(status: StatusCode) -> Self {
        match status.as_u16() / 100 {
            1 => StatusFamily::Informational,
            2 => StatusFamily::Successful,
            3 => StatusFamily::Redirection,
            4 => StatusFamily::ClientError,
            5 => StatusFamily::ServerError,
            _ => StatusFamily::Other,
        }
    }

    /// Whether the status code belongs to this family.
    pub fn includes(self, status: StatusCode) -> bool {
        StatusFamily::of(status) == self
    }
}

/// A response exactly as the transport delivered it.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    headers: Headers,
    payload: SerializedPayload,
}

impl RawResponse {
    /// Assembles a raw response.
    pub fn new(status: StatusCode, headers: Headers, payload: SerializedPayload) -> Self {
        Self {
            status,
            headers,
            payload,
        }
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The canonical reason phrase for the status, when one exists.
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// The status family.
    pub fn family(&self) -> StatusFamily {
        StatusFamily::of(self.status)
    }

    /// The response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The body in wire form.
    pub fn payload(&self) -> &SerializedPayload {
        &self.payload
    }

    /// The response Content-Type, when present and well-formed.
    pub fn content_type(&self) -> Option<MediaType> {
        self.headers
            .get("Content-Type")
            .and_then(|v| v.parse::<MediaType>().ok())
    }
}

/// The mutable form the inbound pipeline works on. Response filters get
/// full access; interceptors a narrowed view.
pub struct MutableResponse {
    status: StatusCode,
    headers: Headers,
    payload: SerializedPayload,
    store: Store,
}

impl MutableResponse {
    pub(crate) fn new(raw: RawResponse, store: Store) -> Self {
        Self {
            status: raw.status,
            headers: raw.headers,
            payload: raw.payload,
            store,
        }
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Replaces the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// The response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to the headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// The body in wire form.
    pub fn payload(&self) -> &SerializedPayload {
        &self.payload
    }

    /// Replaces the body.
    pub fn set_payload(&mut self, payload: SerializedPayload) {
        self.payload = payload;
    }

    /// The cycle store shared with the originating request.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn freeze(self) -> RawResponse {
        RawResponse {
            status: self.status,
            headers: self.headers,
            payload: self.payload,
        }
    }
}

/// A settled, typed response.
#[derive(Debug, Clone)]
pub struct Response<T> {
    raw: Arc<RawResponse>,
    payload: T,
}

impl<T> Response<T> {
    /// Assembles a typed response from a frozen raw response and its
    /// deserialized payload. The pipeline builds these; tests and custom
    /// dispatch glue may too.
    pub fn new(raw: Arc<RawResponse>, payload: T) -> Self {
        Self { raw, payload }
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.raw.status()
    }

    /// The response headers.
    pub fn headers(&self) -> &Headers {
        self.raw.headers()
    }

    /// The deserialized payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consumes the response, returning the payload.
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// The frozen raw response, wire payload included.
    pub fn raw(&self) -> &Arc<RawResponse> {
        &self.raw
    }
}
