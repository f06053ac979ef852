//! Fluent request builder.

use super::{PollingOptions, PollingStrategy, RequestSnapshot};
use crate::auth::Auth;
use crate::deferred::Promise;
use crate::dispatcher::Dispatcher;
use crate::headers::Headers;
use crate::payload::{RequestPayload, SerializedPayload, TypedPayload};
use crate::retry::RetryPolicy;
use crate::serialization::PayloadReader;
use crate::session::SessionConfig;
use crate::store::Store;
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Builds and dispatches requests.
///
/// Setters are fluent and infallible; [`build`](Self::build) produces an
/// immutable [`RequestSnapshot`] (deep-copying headers and polling
/// options, sharing the payload) and leaves the builder reusable. The
/// `send_*` terminals build and dispatch in one step.
///
/// # Panics
///
/// Mixing the media-type shortcuts ([`content_type`](Self::content_type),
/// [`accept`](Self::accept)) with explicitly set `Content-Type`/`Accept`
/// headers is a configuration fault and panics immediately, in either
/// order. Programmer error, not a runtime condition.
pub struct RequestBuilder {
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
    dispatcher: Dispatcher,
    explicit_content_type: bool,
    shortcut_content_type: bool,
    explicit_accept: bool,
    shortcut_accept: bool,
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl RequestBuilder {
    pub(crate) fn new(
        method: Method,
        uri: Url,
        store: Store,
        dispatcher: Dispatcher,
        config: &SessionConfig,
    ) -> Self {
        let mut headers = Headers::new();
        // Session defaults seed the headers without claiming either
        // configuration path; the request may still override them.
        if let Some(content_type) = &config.default_content_type {
            headers.set("Content-Type", content_type.clone());
        }
        if let Some(accept) = &config.default_accept {
            headers.set("Accept", accept.clone());
        }
        Self {
            method,
            uri,
            headers,
            timeout: config.default_timeout,
            delay: config.default_delay,
            polling: PollingOptions::inactive(),
            auth: Arc::new(crate::auth::NoAuth),
            retry: None,
            payload: RequestPayload::Absent,
            store,
            dispatcher,
            explicit_content_type: false,
            shortcut_content_type: false,
            explicit_accept: false,
            shortcut_accept: false,
        }
    }

    /// Sets a header, replacing any existing value.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.mark_explicit(&name);
        self.headers.set(name, value.into());
        self
    }

    /// Appends a value to a list-grammar header.
    #[must_use]
    pub fn append_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.mark_explicit(&name);
        self.headers.append(name, value.into());
        self
    }

    fn mark_explicit(&mut self, name: &str) {
        if name.eq_ignore_ascii_case("content-type") {
            assert!(
                !self.shortcut_content_type,
                "Content-Type was already configured via content_type(); \
                 use one configuration path, not both"
            );
            self.explicit_content_type = true;
        } else if name.eq_ignore_ascii_case("accept") {
            assert!(
                !self.shortcut_accept,
                "Accept was already configured via accept(); \
                 use one configuration path, not both"
            );
            self.explicit_accept = true;
        }
    }

    /// Shortcut for the `Content-Type` header.
    #[must_use]
    pub fn content_type(mut self, media_type: impl Into<String>) -> Self {
        assert!(
            !self.explicit_content_type,
            "Content-Type was already set as an explicit header; \
             use one configuration path, not both"
        );
        self.shortcut_content_type = true;
        self.headers.set("Content-Type", media_type.into());
        self
    }

    /// Shortcut for the `Accept` header.
    #[must_use]
    pub fn accept(mut self, media_type: impl Into<String>) -> Self {
        assert!(
            !self.explicit_accept,
            "Accept was already set as an explicit header; \
             use one configuration path, not both"
        );
        self.shortcut_accept = true;
        self.headers.set("Accept", media_type.into());
        self
    }

    /// Sets the authentication hook.
    #[must_use]
    pub fn auth(mut self, auth: impl Auth + 'static) -> Self {
        self.auth = Arc::new(auth);
        self
    }

    /// Sets a typed payload, serialized by the registry at dispatch.
    #[must_use]
    pub fn payload<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.payload = RequestPayload::Typed(TypedPayload::single(value));
        self
    }

    /// Sets a typed collection payload.
    #[must_use]
    pub fn payload_collection<T: Send + Sync + 'static>(mut self, values: Vec<T>) -> Self {
        self.payload = RequestPayload::Typed(TypedPayload::collection(values));
        self
    }

    /// Sets an already-serialized payload, bypassing the serializer.
    #[must_use]
    pub fn raw_payload(mut self, payload: impl Into<SerializedPayload>) -> Self {
        self.payload = RequestPayload::Serialized {
            wire: payload.into(),
            source: None,
        };
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the pre-send delay.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Activates polling. `limit == 0` polls without bound until
    /// `stop_polling` is called.
    #[must_use]
    pub fn poll(mut self, strategy: PollingStrategy, interval: Duration, limit: u32) -> Self {
        self.polling = PollingOptions::new(strategy, interval, limit);
        self
    }

    /// Sets the retry policy for transport faults and retryable
    /// statuses.
    #[must_use]
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Produces an immutable snapshot. The builder stays usable; headers
    /// and polling options are deep-copied, the payload is shared.
    pub fn build(&self) -> RequestSnapshot {
        RequestSnapshot::new(
            self.method.clone(),
            self.uri.clone(),
            self.headers.clone(),
            self.timeout,
            self.delay,
            self.polling.detach(),
            Arc::clone(&self.auth),
            self.retry.clone(),
            self.payload.clone(),
            self.store.clone(),
        )
    }

    /// Dispatches, expecting a single entity of `T` in the response.
    pub fn send<T>(&self) -> Promise<T>
    where
        T: Send + Sync + 'static,
    {
        self.dispatcher
            .dispatch(self.build(), PayloadReader::<T>::single())
    }

    /// Dispatches, expecting a collection of `T` accumulated into `C`.
    pub fn send_all<C, T>(&self) -> Promise<C>
    where
        C: Default + Extend<T> + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        self.dispatcher
            .dispatch(self.build(), PayloadReader::<C>::collection::<T>())
    }

    /// Dispatches, ignoring any response payload.
    pub fn send_none(&self) -> Promise<()> {
        self.dispatcher.dispatch(self.build(), PayloadReader::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{RequestProcessor, ResponseProcessor};
    use crate::serialization::{ProviderRegistry, SerdesRegistry, SerializationEngine};
    use crate::transport::MockTransport;

    fn builder() -> RequestBuilder {
        let registry = SerdesRegistry::new();
        let engine = SerializationEngine::new(registry);
        let filters = crate::filter::FilterManager::new();
        let interceptors = crate::interceptor::InterceptorManager::new();
        let dispatcher = Dispatcher::new(
            Arc::new(MockTransport::new()),
            RequestProcessor::new(engine.clone(), filters.clone(), interceptors.clone()),
            ResponseProcessor::new(engine, ProviderRegistry::new(), filters, interceptors),
        );
        RequestBuilder::new(
            Method::POST,
            Url::parse("http://localhost/x").unwrap(),
            Store::new(),
            dispatcher,
            &SessionConfig::default(),
        )
    }

    #[test]
    fn build_leaves_builder_reusable() {
        let builder = builder().header("X-A", "1");
        let first = builder.build();
        let second = builder.header("X-B", "2").build();
        assert!(first.headers().get("x-b").is_none());
        assert_eq!(second.headers().get("x-a"), Some("1"));
        assert_eq!(second.headers().get("x-b"), Some("2"));
    }

    #[test]
    fn snapshots_have_independent_polling_state() {
        let builder = builder().poll(PollingStrategy::Short, Duration::from_millis(5), 3);
        let first = builder.build();
        let second = builder.build();
        first.stop_polling();
        assert!(second.polling().is_polling());
    }

    #[test]
    #[should_panic(expected = "use one configuration path")]
    fn shortcut_after_explicit_header_panics() {
        let _ = builder()
            .header("Content-Type", "application/json")
            .content_type("text/plain");
    }

    #[test]
    #[should_panic(expected = "use one configuration path")]
    fn explicit_header_after_shortcut_panics() {
        let _ = builder().accept("application/json").header("Accept", "text/plain");
    }

    #[test]
    fn session_defaults_do_not_claim_a_path() {
        let registry = SerdesRegistry::new();
        let engine = SerializationEngine::new(registry);
        let filters = crate::filter::FilterManager::new();
        let interceptors = crate::interceptor::InterceptorManager::new();
        let dispatcher = Dispatcher::new(
            Arc::new(MockTransport::new()),
            RequestProcessor::new(engine.clone(), filters.clone(), interceptors.clone()),
            ResponseProcessor::new(engine, ProviderRegistry::new(), filters, interceptors),
        );
        let config = SessionConfig {
            default_accept: Some("application/json".to_owned()),
            ..Default::default()
        };
        let builder = RequestBuilder::new(
            Method::GET,
            Url::parse("http://localhost/x").unwrap(),
            Store::new(),
            dispatcher,
            &config,
        );
        // The default can still be overridden through either path.
        let snapshot = builder.accept("text/plain").build();
        assert_eq!(snapshot.headers().get("accept"), Some("text/plain"));
    }
}
