//! Request and response filters.
//!
//! Filters are the wide end of the pipeline: they see the whole in-flight
//! message and may rewrite anything on it: headers, method, URI, auth,
//! timeout, payload. They run first on both the outbound and inbound
//! chains, in registration order. For the narrower header/payload hook,
//! see [`crate::interceptor`].

use crate::error::Result;
use crate::processor::ProcessContext;
use crate::request::MutableRequest;
use crate::response::MutableResponse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Outbound pipeline stage with full access to the request.
///
/// Errors propagate to the dispatch boundary and reject the promise;
/// [`ProcessContext::abort_with`] short-circuits the remaining chain.
pub trait RequestFilter: Send + Sync {
    /// Inspects or rewrites the outgoing request.
    fn filter(&self, request: &mut MutableRequest, ctx: &mut ProcessContext) -> Result<()>;
}

/// Inbound pipeline stage with full access to the response.
pub trait ResponseFilter: Send + Sync {
    /// Inspects or rewrites the incoming response.
    fn filter(&self, response: &mut MutableResponse, ctx: &mut ProcessContext) -> Result<()>;
}

impl<F> RequestFilter for F
where
    F: Fn(&mut MutableRequest, &mut ProcessContext) -> Result<()> + Send + Sync,
{
    fn filter(&self, request: &mut MutableRequest, ctx: &mut ProcessContext) -> Result<()> {
        self(request, ctx)
    }
}

impl<F> ResponseFilter for F
where
    F: Fn(&mut MutableResponse, &mut ProcessContext) -> Result<()> + Send + Sync,
{
    fn filter(&self, response: &mut MutableResponse, ctx: &mut ProcessContext) -> Result<()> {
        self(response, ctx)
    }
}

struct Entry<T: ?Sized> {
    id: u64,
    stage: Arc<T>,
}

#[derive(Default)]
struct FilterManagerInner {
    request: RwLock<Vec<Entry<dyn RequestFilter>>>,
    response: RwLock<Vec<Entry<dyn ResponseFilter>>>,
    next_id: AtomicU64,
}

/// Ordered registry of request and response filters.
///
/// Registration order is execution order. Each processed message works
/// on a snapshot of the list taken when its chain starts, so mid-flight
/// (de)registrations only affect later messages.
#[derive(Clone, Default)]
pub struct FilterManager {
    inner: Arc<FilterManagerInner>,
}

impl FilterManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a request filter, returning its removal handle.
    pub fn register_request_filter<F>(&self, filter: F) -> FilterRegistration
    where
        F: RequestFilter + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .request
            .write()
            .expect("filter lock poisoned")
            .push(Entry {
                id,
                stage: Arc::new(filter),
            });
        FilterRegistration {
            manager: Arc::downgrade(&self.inner),
            id,
            response: false,
        }
    }

    /// Appends a response filter, returning its removal handle.
    pub fn register_response_filter<F>(&self, filter: F) -> FilterRegistration
    where
        F: ResponseFilter + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner
            .response
            .write()
            .expect("filter lock poisoned")
            .push(Entry {
                id,
                stage: Arc::new(filter),
            });
        FilterRegistration {
            manager: Arc::downgrade(&self.inner),
            id,
            response: true,
        }
    }

    /// Snapshot of the request filters in execution order.
    pub(crate) fn request_filters(&self) -> Vec<Arc<dyn RequestFilter>> {
        self.inner
            .request
            .read()
            .expect("filter lock poisoned")
            .iter()
            .map(|e| Arc::clone(&e.stage))
            .collect()
    }

    /// Snapshot of the response filters in execution order.
    pub(crate) fn response_filters(&self) -> Vec<Arc<dyn ResponseFilter>> {
        self.inner
            .response
            .read()
            .expect("filter lock poisoned")
            .iter()
            .map(|e| Arc::clone(&e.stage))
            .collect()
    }
}

/// Handle removing a filter from its manager.
pub struct FilterRegistration {
    manager: Weak<FilterManagerInner>,
    id: u64,
    response: bool,
}

impl FilterRegistration {
    /// Removes the filter.
    pub fn deregister(self) {
        let Some(inner) = self.manager.upgrade() else {
            return;
        };
        if self.response {
            inner
                .response
                .write()
                .expect("filter lock poisoned")
                .retain(|e| e.id != self.id);
        } else {
            inner
                .request
                .write()
                .expect("filter lock poisoned")
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

    fn request() -> MutableRequest {
        let snapshot =
            RequestSnapshot::for_test(Method::GET, Url::parse("http://localhost/").unwrap());
        MutableRequest::from_snapshot(&snapshot, Store::new().leaf())
    }

    #[test]
    fn snapshot_preserves_registration_order() {
        let manager = FilterManager::new();
        for tag in ["A", "B", "C"] {
            manager.register_request_filter(
                move |req: &mut MutableRequest, _ctx: &mut ProcessContext| -> Result<()> {
                    req.headers_mut().append("X-Trace", tag);
                    Ok(())
                },
            );
        }

        let mut req = request();
        let mut ctx = ProcessContext::new();
        for filter in manager.request_filters() {
            filter.filter(&mut req, &mut ctx).unwrap();
        }
        assert_eq!(req.headers().get("x-trace"), Some("A, B, C"));
    }

    #[test]
    fn deregistration_removes_only_the_target() {
        let manager = FilterManager::new();
        let keep = manager.register_request_filter(
            |_: &mut MutableRequest, _: &mut ProcessContext| -> Result<()> { Ok(()) },
        );
        let drop_me = manager.register_request_filter(
            |_: &mut MutableRequest, _: &mut ProcessContext| -> Result<()> { Ok(()) },
        );
        assert_eq!(manager.request_filters().len(), 2);
        drop_me.deregister();
        assert_eq!(manager.request_filters().len(), 1);
        let _ = keep;
    }
}
