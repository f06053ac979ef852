//! Request and response interceptors.
//!
//! Interceptors are the narrow end of the pipeline: they run after
//! serialization (outbound) or before deserialization (inbound) and only
//! see headers, content type and the wire payload through a view struct.
//! Use a [`crate::filter`] when a stage needs to touch anything else.

use crate::error::Result;
use crate::headers::Headers;
use crate::payload::SerializedPayload;
use crate::processor::ProcessContext;
use crate::request::MutableRequest;
use crate::response::MutableResponse;
use http::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Narrow view of an outgoing request: headers and serialized payload.
pub struct RequestView<'a> {
    inner: &'a mut MutableRequest,
}

impl<'a> RequestView<'a> {
    pub(crate) fn new(inner: &'a mut MutableRequest) -> Self {
        Self { inner }
    }

    /// The request headers.
    pub fn headers(&self) -> &Headers {
        self.inner.headers()
    }

    /// Mutable access to the headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        self.inner.headers_mut()
    }

    /// The Content-Type header value, if set.
    pub fn content_type(&self) -> Option<&str> {
        self.inner.headers().get("Content-Type")
    }

    /// Replaces the Content-Type header.
    pub fn set_content_type(&mut self, value: impl Into<String>) {
        self.inner.headers_mut().set("Content-Type", value.into());
    }

    /// The serialized payload.
    pub fn payload(&self) -> SerializedPayload {
        self.inner.payload().wire()
    }

    /// Replaces the serialized payload.
    pub fn set_payload(&mut self, payload: SerializedPayload) {
        self.inner.payload_mut().mark_serialized(payload);
    }
}

/// Narrow view of an incoming response: status (read-only), headers and
/// wire payload.
pub struct ResponseView<'a> {
    inner: &'a mut MutableResponse,
}

impl<'a> ResponseView<'a> {
    pub(crate) fn new(inner: &'a mut MutableResponse) -> Self {
        Self { inner }
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// The response headers.
    pub fn headers(&self) -> &Headers {
        self.inner.headers()
    }

    /// Mutable access to the headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        self.inner.headers_mut()
    }

    /// The Content-Type header value, if set.
    pub fn content_type(&self) -> Option<&str> {
        self.inner.headers().get("Content-Type")
    }

    /// The wire payload.
    pub fn payload(&self) -> &SerializedPayload {
        self.inner.payload()
    }

    /// Replaces the wire payload before deserialization sees it.
    pub fn set_payload(&mut self, payload: SerializedPayload) {
        self.inner.set_payload(payload);
    }
}

/// Outbound stage over the serialized request.
pub trait RequestInterceptor: Send + Sync {
    /// Inspects or rewrites the serialized request.
    fn intercept(&self, request: &mut RequestView<'_>, ctx: &mut ProcessContext) -> Result<()>;
}

/// Inbound stage over the raw response.
pub trait ResponseInterceptor: Send + Sync {
    /// Inspects or rewrites the raw response.
    fn intercept(&self, response: &mut ResponseView<'_>, ctx: &mut ProcessContext) -> Result<()>;
}

impl<F> RequestInterceptor for F
where
    F: Fn(&mut RequestView<'_>, &mut ProcessContext) -> Result<()> + Send + Sync,
{
    fn intercept(&self, request: &mut RequestView<'_>, ctx: &mut ProcessContext) -> Result<()> {
        self(request, ctx)
    }
}

impl<F> ResponseInterceptor for F
where
    F: Fn(&mut ResponseView<'_>, &mut ProcessContext) -> Result<()> + Send + Sync,
{
    fn intercept(&self, response: &mut ResponseView<'_>, ctx: &mut ProcessContext) -> Result<()> {
        self(response, ctx)
    }
}

struct Entry<T: ?Sized> {
    id: u64,
    stage: Arc<T>,
}

#[derive(Default)]
struct InterceptorManagerInner {
    request: RwLock<Vec<Entry<dyn RequestInterceptor>>>,
    response: RwLock<Vec<Entry<dyn ResponseInterceptor>>>,
    next_id: AtomicU64,
}

/// Ordered registry of request and response interceptors. Registration
/// order is execution order; processing works on per-message snapshots.
#[derive(Clone, Default)]
pub struct InterceptorManager {
    inner: Arc<InterceptorManagerInner>,
}

impl InterceptorManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request interceptor, returning its removal handle.
    pub fn register_request_interceptor<I>(&self, interceptor: I) -> InterceptorRegistration
    where
        I: RequestInterceptor + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .request
            .write()
            .expect("interceptor lock poisoned")
            .push(Entry {
                id,
                stage: Arc::new(interceptor),
            });
        InterceptorRegistration {
            manager: Arc::downgrade(&self.inner),
            id,
            response: false,
        }
    }

    /// Appends a response interceptor, returning its removal handle.
    pub fn register_response_interceptor<I>(&self, interceptor: I) -> InterceptorRegistration
    where
        I: ResponseInterceptor + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .response
            .write()
            .expect("interceptor lock poisoned")
            .push(Entry {
                id,
                stage: Arc::new(interceptor),
            });
        InterceptorRegistration {
            manager: Arc::downgrade(&self.inner),
            id,
            response: true,
        }
    }

    pub(crate) fn request_interceptors(&self) -> Vec<Arc<dyn RequestInterceptor>> {
        self.inner
            .request
            .read()
            .expect("interceptor lock poisoned")
            .iter()
            .map(|e| Arc::clone(&e.stage))
            .collect()
    }

    pub(crate) fn response_interceptors(&self) -> Vec<Arc<dyn ResponseInterceptor>> {
        self.inner
            .response
            .read()
            .expect("interceptor lock poisoned")
            .iter()
            .map(|e| Arc::clone(&e.stage))
            .collect()
    }
}

/// Handle removing an interceptor from its manager.
pub struct InterceptorRegistration {
    manager: Weak<InterceptorManagerInner>,
    id: u64,
    response: bool,
}

impl InterceptorRegistration {
    /// Removes the interceptor.
    pub fn deregister(self) {
        let Some(inner) = self.manager.upgrade() else {
            return;
        };
        if self.response {
            inner
                .response
                .write()
                .expect("interceptor lock poisoned")
                .retain(|e| e.id != self.id);
        } else {
            inner
                .request
                .write()
                .expect("interceptor lock poisoned")
                .retain(|e| e.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestSnapshot;
    use crate::store::Store;
    use http::Method;
    use url::Url;

    #[test]
    fn view_exposes_only_wire_payload() {
        let snapshot =
            RequestSnapshot::for_test(Method::POST, Url::parse("http://localhost/").unwrap());
        let mut req = MutableRequest::from_snapshot(&snapshot, Store::new().leaf());
        req.payload_mut().mark_serialized("wire".into());

        let mut view = RequestView::new(&mut req);
        assert_eq!(view.payload().as_text(), Some("wire"));
        view.set_payload("rewritten".into());
        view.set_content_type("text/plain");
        drop(view);

        assert_eq!(req.payload().wire().as_text(), Some("rewritten"));
        assert_eq!(req.headers().get("content-type"), Some("text/plain"));
    }

    #[test]
    fn interceptors_run_in_registration_order() {
        let manager = InterceptorManager::new();
        for tag in ["X", "Y"] {
            manager.register_request_interceptor(
                move |view: &mut RequestView<'_>, _ctx: &mut ProcessContext| -> Result<()> {
                    view.headers_mut().append("X-Order", tag);
                    Ok(())
                },
            );
        }

        let snapshot =
            RequestSnapshot::for_test(Method::GET, Url::parse("http://localhost/").unwrap());
        let mut req = MutableRequest::from_snapshot(&snapshot, Store::new().leaf());
        let mut ctx = ProcessContext::new();
        for interceptor in manager.request_interceptors() {
            let mut view = RequestView::new(&mut req);
            interceptor.intercept(&mut view, &mut ctx).unwrap();
        }
        assert_eq!(req.headers().get("x-order"), Some("X, Y"));
    }
}
