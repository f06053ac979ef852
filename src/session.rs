//! Session facade: registries, shared store, dispatcher and transport
//! wired together.

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::filter::{
    FilterManager, FilterRegistration, RequestFilter, ResponseFilter,
};
use crate::interceptor::{
    InterceptorManager, InterceptorRegistration, RequestInterceptor, ResponseInterceptor,
};
use crate::media::MediaType;
use crate::processor::{RequestProcessor, ResponseProcessor};
use crate::request::RequestBuilder;
use crate::serialization::{
    Deserializer, ProviderRegistry, Registration, SerdesRegistry, SerializationEngine, Serializer,
    TextSerdes,
};
use crate::store::Store;
use crate::transport::Transport;
use http::Method;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Session-wide defaults and limits.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URI relative request paths resolve against.
    pub base_uri: Option<Url>,
    /// Timeout applied to requests that set none.
    pub default_timeout: Option<Duration>,
    /// Delay applied to requests that set none.
    pub default_delay: Option<Duration>,
    /// Content-Type seeded into new requests.
    pub default_content_type: Option<String>,
    /// Accept seeded into new requests.
    pub default_accept: Option<String>,
    /// Whether the built-in plain-text serdes is registered up front.
    pub register_builtin_serdes: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_uri: None,
            default_timeout: Some(Duration::from_secs(30)),
            default_delay: None,
            default_content_type: None,
            default_accept: None,
            register_builtin_serdes: true,
        }
    }
}

impl SessionConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// A configuration fault for an excessive default timeout or a
    /// malformed default media type.
    pub fn validate(&self) -> Result<()> {
        const MAX_TIMEOUT: Duration = Duration::from_secs(300);
        if let Some(timeout) = self.default_timeout {
            if timeout > MAX_TIMEOUT {
                return Err(Error::configuration(format!(
                    "default_timeout {timeout:?} exceeds the 5 minute ceiling"
                )));
            }
        }
        if let Some(content_type) = &self.default_content_type {
            content_type.parse::<MediaType>()?;
        }
        if let Some(accept) = &self.default_accept {
            accept.parse::<MediaType>()?;
        }
        Ok(())
    }
}

struct SessionInner {
    config: SessionConfig,
    registry: SerdesRegistry,
    providers: ProviderRegistry,
    filters: FilterManager,
    interceptors: InterceptorManager,
    store: Store,
    dispatcher: Dispatcher,
}

/// The entry point: owns the registries, the persistent store tier and
/// the dispatcher, and starts requests against an injected transport.
///
/// Cloning shares the same session. All methods take `&self`; a session
/// is meant to live for the whole program and be passed around freely.
///
/// # Example
///
/// ```rust,no_run
/// use courier_core::{Session, transport::ReqwestTransport};
/// use courier_core::serialization::JsonSerdes;
/// use http::Method;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Book {
///     title: String,
/// }
///
/// # fn main() -> courier_core::error::Result<()> {
/// let session = Session::new(ReqwestTransport::new()?);
/// session.register_serdes::<Book, _>(JsonSerdes::new())?;
///
/// let promise = session
///     .req(Method::GET, "http://localhost:8080/books/1")?
///     .accept("application/json")
///     .send::<Book>();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Creates a session with default configuration.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::build(Arc::new(transport), SessionConfig::default())
    }

    /// Creates a session with explicit configuration.
    ///
    /// # Errors
    ///
    /// A configuration fault when the configuration is invalid.
    pub fn with_config(
        transport: impl Transport + 'static,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(Arc::new(transport), config))
    }

    fn build(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let registry = SerdesRegistry::new();
        if config.register_builtin_serdes {
            registry
                .register_serdes::<String, _>(TextSerdes::new())
                .expect("builtin serdes patterns are valid");
        }
        let providers = ProviderRegistry::new();
        let filters = FilterManager::new();
        let interceptors = InterceptorManager::new();
        let engine = SerializationEngine::new(registry.clone());

        let dispatcher = Dispatcher::new(
            transport,
            RequestProcessor::new(engine.clone(), filters.clone(), interceptors.clone()),
            ResponseProcessor::new(
                engine,
                providers.clone(),
                filters.clone(),
                interceptors.clone(),
            ),
        );

        Self {
            inner: Arc::new(SessionInner {
                config,
                registry,
                providers,
                filters,
                interceptors,
                store: Store::new(),
                dispatcher,
            }),
        }
    }

    /// Starts a request. Relative paths resolve against the configured
    /// base URI.
    ///
    /// # Errors
    ///
    /// A configuration fault when the URI cannot be parsed or resolved.
    pub fn req(&self, method: Method, uri: &str) -> Result<RequestBuilder> {
        let url = match &self.inner.config.base_uri {
            Some(base) => base.join(uri),
            None => Url::parse(uri),
        }
        .map_err(|e| Error::configuration(format!("invalid request URI `{uri}`: {e}")))?;
        Ok(RequestBuilder::new(
            method,
            url,
            self.inner.store.clone(),
            self.inner.dispatcher.clone(),
            &self.inner.config,
        ))
    }

    /// Registers a combined serializer/deserializer for `T`.
    pub fn register_serdes<T, S>(&self, serdes: S) -> Result<Registration>
    where
        T: Send + Sync + 'static,
        S: Serializer<T> + Deserializer<T> + 'static,
    {
        self.inner.registry.register_serdes::<T, S>(serdes)
    }

    /// Registers a serializer for `T`.
    pub fn register_serializer<T, S>(&self, serializer: S) -> Result<Registration>
    where
        T: Send + Sync + 'static,
        S: Serializer<T> + 'static,
    {
        self.inner.registry.register_serializer::<T, S>(serializer)
    }

    /// Registers a deserializer for `T`.
    pub fn register_deserializer<T, D>(&self, deserializer: D) -> Result<Registration>
    where
        T: Send + Sync + 'static,
        D: Deserializer<T> + 'static,
    {
        self.inner.registry.register_deserializer::<T, D>(deserializer)
    }

    /// Registers a container factory for deserializers.
    pub fn register_provider<C, F>(&self, name: impl Into<String>, factory: F)
    where
        C: Send + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.inner.providers.register(name, factory);
    }

    /// Registers a request filter.
    pub fn register_request_filter<F>(&self, filter: F) -> FilterRegistration
    where
        F: RequestFilter + 'static,
    {
        self.inner.filters.register_request_filter(filter)
    }

    /// Registers a response filter.
    pub fn register_response_filter<F>(&self, filter: F) -> FilterRegistration
    where
        F: ResponseFilter + 'static,
    {
        self.inner.filters.register_response_filter(filter)
    }

    /// Registers a request interceptor.
    pub fn register_request_interceptor<I>(&self, interceptor: I) -> InterceptorRegistration
    where
        I: RequestInterceptor + 'static,
    {
        self.inner.interceptors.register_request_interceptor(interceptor)
    }

    /// Registers a response interceptor.
    pub fn register_response_interceptor<I>(&self, interceptor: I) -> InterceptorRegistration
    where
        I: ResponseInterceptor + 'static,
    {
        self.inner.interceptors.register_response_interceptor(interceptor)
    }

    /// The session store (persistent tier).
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    #[test]
    fn relative_uris_resolve_against_base() {
        let config = SessionConfig {
            base_uri: Some(Url::parse("http://localhost:9000/api/").unwrap()),
            ..Default::default()
        };
        let session = Session::with_config(MockTransport::new(), config).unwrap();
        let builder = session.req(Method::GET, "books/1").unwrap();
        assert_eq!(
            builder.build().uri().as_str(),
            "http://localhost:9000/api/books/1"
        );
    }

    #[test]
    fn invalid_uri_is_a_configuration_fault() {
        let session = Session::new(MockTransport::new());
        let err = session.req(Method::GET, "not a uri").unwrap_err();
        assert!(err.as_configuration().is_some());
    }

    #[test]
    fn config_validation_rejects_excessive_timeout() {
        let config = SessionConfig {
            default_timeout: Some(Duration::from_secs(600)),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            default_content_type: Some("not-a-media-type".to_owned()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
