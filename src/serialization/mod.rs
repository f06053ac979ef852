//! Pluggable serialization layer.
//!
//! Serializers and deserializers register against a payload type and one
//! or more media-type patterns (`type/subtype`, either segment may be
//! `*`). The [`SerdesRegistry`] resolves the best entry for a concrete
//! media type by the wildcard precedence rule in [`crate::media`]; the
//! [`SerializationEngine`] drives outbound serialization; inbound
//! deserialization runs through a [`PayloadReader`] built at dispatch
//! time, which also encodes whether a single entity or a collection is
//! expected.

mod engine;
mod form;
mod json;
mod provider;
mod registry;
mod text;

pub use engine::SerializationEngine;
pub use form::{FormData, FormUrlEncodedSerializer};
pub use json::JsonSerdes;
pub use provider::ProviderRegistry;
pub use registry::{Registration, SerdesRegistry};
pub use text::TextSerdes;

use crate::error::{Error, Result, SerializationError};
use crate::media::MediaType;
use crate::payload::SerializedPayload;
use crate::request::SerializedRequest;
use crate::response::RawResponse;
use crate::store::Store;
use std::any::TypeId;
use std::sync::Arc;

/// Serializes values of `T` to wire payloads.
pub trait Serializer<T>: Send + Sync {
    /// The media-type patterns this serializer handles.
    fn media_types(&self) -> Vec<String>;

    /// Serializes a single value.
    fn serialize(&self, value: &T, ctx: &SerializationContext<'_>) -> Result<SerializedPayload>;

    /// Serializes a collection of values. `values` is never empty; the
    /// engine short-circuits empty collections to the canonical empty
    /// form before consulting the serializer.
    fn serialize_collection(
        &self,
        values: &[T],
        ctx: &SerializationContext<'_>,
    ) -> Result<SerializedPayload>;
}

/// Deserializes wire payloads into values of `T`.
pub trait Deserializer<T>: Send + Sync {
    /// The media-type patterns this deserializer handles.
    fn media_types(&self) -> Vec<String>;

    /// Deserializes a single value.
    fn deserialize(
        &self,
        payload: &SerializedPayload,
        ctx: &DeserializationContext<'_>,
    ) -> Result<T>;

    /// Deserializes a collection of values.
    fn deserialize_collection(
        &self,
        payload: &SerializedPayload,
        ctx: &DeserializationContext<'_>,
    ) -> Result<Vec<T>>;
}

/// Context available to serializers.
pub struct SerializationContext<'a> {
    media_type: &'a MediaType,
    store: &'a Store,
}

impl<'a> SerializationContext<'a> {
    pub(crate) fn new(media_type: &'a MediaType, store: &'a Store) -> Self {
        Self { media_type, store }
    }

    /// The negotiated media type the payload is being serialized for.
    pub fn media_type(&self) -> &MediaType {
        self.media_type
    }

    /// The request cycle store.
    pub fn store(&self) -> &Store {
        self.store
    }
}

/// Context available to deserializers: the originating request, the raw
/// response, and the instance-provider lookup for container types.
pub struct DeserializationContext<'a> {
    request: &'a SerializedRequest,
    response: &'a RawResponse,
    providers: &'a ProviderRegistry,
    media_type: &'a MediaType,
}

impl<'a> DeserializationContext<'a> {
    pub(crate) fn new(
        request: &'a SerializedRequest,
        response: &'a RawResponse,
        providers: &'a ProviderRegistry,
        media_type: &'a MediaType,
    ) -> Self {
        Self {
            request,
            response,
            providers,
            media_type,
        }
    }

    /// The request that produced this response.
    pub fn request(&self) -> &SerializedRequest {
        self.request
    }

    /// The raw response being deserialized.
    pub fn response(&self) -> &RawResponse {
        self.response
    }

    /// The negotiated media type of the response body.
    pub fn media_type(&self) -> &MediaType {
        self.media_type
    }

    /// Instantiates a registered container type by name.
    pub fn instance<C: Send + 'static>(&self, name: &str) -> Option<C> {
        self.providers.instance(name)
    }
}

/// Shape of the expected response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// No payload expected; the body is ignored.
    None,
    /// A single entity.
    Single,
    /// A collection of entities.
    Collection,
}

/// Type-erased recipe for turning a response body into the promised
/// payload type. Built once per dispatch and reused by every poll tick.
pub(crate) struct PayloadReader<P> {
    kind: PayloadKind,
    read: Arc<
        dyn Fn(&SerdesRegistry, &SerializedPayload, &DeserializationContext<'_>) -> Result<P>
            + Send
            + Sync,
    >,
}

impl<P> Clone for PayloadReader<P> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            read: Arc::clone(&self.read),
        }
    }
}

impl<P> PayloadReader<P> {
    /// The expected payload shape, for lookups and diagnostics.
    pub(crate) fn kind(&self) -> PayloadKind {
        self.kind
    }

    /// Runs the recipe against a response body.
    pub(crate) fn read(
        &self,
        registry: &SerdesRegistry,
        payload: &SerializedPayload,
        ctx: &DeserializationContext<'_>,
    ) -> Result<P> {
        (self.read)(registry, payload, ctx)
    }
}

impl PayloadReader<()> {
    /// Expects no payload; the body is left untouched.
    pub(crate) fn none() -> Self {
        Self {
            kind: PayloadKind::None,
            read: Arc::new(|_, _, _| Ok(())),
        }
    }
}

impl<T: Send + Sync + 'static> PayloadReader<T> {
    /// Expects a single entity of type `T`.
    pub(crate) fn single() -> Self {
        Self {
            kind: PayloadKind::Single,
            read: Arc::new(|registry, payload, ctx| {
                let resolved = registry.deserializer_for(
                    TypeId::of::<T>(),
                    std::any::type_name::<T>(),
                    ctx.media_type(),
                )?;
                let boxed = resolved.deserialize_single(payload, ctx)?;
                boxed.downcast::<T>().map(|value| *value).map_err(|_| {
                    Error::serialization(SerializationError::type_mismatch(
                        std::any::type_name::<T>(),
                        "deserializer produced a value of an unexpected type",
                    ))
                })
            }),
        }
    }
}

impl<C: Send + Sync + 'static> PayloadReader<C> {
    /// Expects a collection of `T` accumulated into the container `C`.
    pub(crate) fn collection<T>() -> Self
    where
        C: Default + Extend<T>,
        T: Send + Sync + 'static,
    {
        Self {
            kind: PayloadKind::Collection,
            read: Arc::new(|registry, payload, ctx| {
                let resolved = registry.deserializer_for(
                    TypeId::of::<T>(),
                    std::any::type_name::<T>(),
                    ctx.media_type(),
                )?;
                let boxed = resolved.deserialize_collection(payload, ctx)?;
                let items = boxed.downcast::<Vec<T>>().map(|value| *value).map_err(|_| {
                    Error::serialization(SerializationError::type_mismatch(
                        std::any::type_name::<T>(),
                        "deserializer produced a collection of an unexpected type",
                    ))
                })?;
                let mut container = C::default();
                container.extend(items);
                Ok(container)
            }),
        }
    }
}
