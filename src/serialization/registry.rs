//! Registry of serializers and deserializers.
//!
//! Entries are keyed by the handled Rust type and a media-type pattern;
//! one registration fans out into one entry per declared pattern.
//! Resolution picks, among the entries whose pattern matches the target
//! media type, the one with the most specific pattern; registration
//! order breaks ties, first registrant winning. Registration returns a
//! [`Registration`] handle that removes the entries when deregistered.

use super::{
    DeserializationContext, Deserializer, SerializationContext, Serializer,
};
use crate::error::{Error, Result, SerializationError};
use crate::media::{MediaType, MediaTypePattern};
use crate::payload::{SerializedPayload, TypedPayload};
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};
use tracing::debug;

// Object-safe adapters over the typed traits. The typed value travels as
// a `TypedPayload` (outbound) or `Box<dyn Any>` (inbound); the adapter
// restores the concrete type on both sides.

trait ErasedSerializer: Send + Sync {
    fn serialize_typed(
        &self,
        value: &TypedPayload,
        ctx: &SerializationContext<'_>,
        pattern: &MediaTypePattern,
    ) -> Result<SerializedPayload>;
}

trait ErasedDeserializer: Send + Sync {
    fn deserialize_single(
        &self,
        payload: &SerializedPayload,
        ctx: &DeserializationContext<'_>,
    ) -> Result<Box<dyn Any + Send>>;

    fn deserialize_collection(
        &self,
        payload: &SerializedPayload,
        ctx: &DeserializationContext<'_>,
    ) -> Result<Box<dyn Any + Send>>;
}

struct SerializerAdapter<T, S> {
    inner: Arc<S>,
    _marker: PhantomData<fn(T)>,
}

impl<T, S> ErasedSerializer for SerializerAdapter<T, S>
where
    T: Send + Sync + 'static,
    S: Serializer<T>,
{
    fn serialize_typed(
        &self,
        value: &TypedPayload,
        ctx: &SerializationContext<'_>,
        pattern: &MediaTypePattern,
    ) -> Result<SerializedPayload> {
        if let Some(single) = value.downcast_single::<T>() {
            return self.inner.serialize(single, ctx);
        }
        if let Some(items) = value.downcast_collection::<T>() {
            if items.is_empty() {
                // Nothing to inspect for element resolution; fall back to
                // the canonical empty form instead of failing.
                let json_like =
                    pattern.is_json_like() || ctx.media_type().sub().contains("json");
                debug!(
                    media_type = %ctx.media_type(),
                    "serializing empty collection to its canonical empty form"
                );
                let empty = if json_like { "[]" } else { "" };
                return Ok(SerializedPayload::Text(empty.to_owned()));
            }
            return self.inner.serialize_collection(items, ctx);
        }
        Err(Error::serialization(SerializationError::type_mismatch(
            value.type_name(),
            "payload does not match the registered serializer type",
        )))
    }
}

struct DeserializerAdapter<T, D> {
    inner: Arc<D>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, D> ErasedDeserializer for DeserializerAdapter<T, D>
where
    T: Send + Sync + 'static,
    D: Deserializer<T>,
{
    fn deserialize_single(
        &self,
        payload: &SerializedPayload,
        ctx: &DeserializationContext<'_>,
    ) -> Result<Box<dyn Any + Send>> {
        let value = self.inner.deserialize(payload, ctx)?;
        Ok(Box::new(value))
    }

    fn deserialize_collection(
        &self,
        payload: &SerializedPayload,
        ctx: &DeserializationContext<'_>,
    ) -> Result<Box<dyn Any + Send>> {
        let values = self.inner.deserialize_collection(payload, ctx)?;
        Ok(Box::new(values))
    }
}

struct SerializerEntry {
    id: u64,
    seq: u64,
    type_id: TypeId,
    pattern: MediaTypePattern,
    serializer: Arc<dyn ErasedSerializer>,
}

struct DeserializerEntry {
    id: u64,
    seq: u64,
    type_id: TypeId,
    pattern: MediaTypePattern,
    deserializer: Arc<dyn ErasedDeserializer>,
}

#[derive(Default)]
struct RegistryInner {
    serializers: RwLock<Vec<SerializerEntry>>,
    deserializers: RwLock<Vec<DeserializerEntry>>,
    next_id: AtomicU64,
    next_seq: AtomicU64,
}

/// A resolved serializer: the winning pattern plus the erased entry.
pub(crate) struct ResolvedSerializer {
    pattern: MediaTypePattern,
    serializer: Arc<dyn ErasedSerializer>,
}

impl std::fmt::Debug for ResolvedSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSerializer")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

impl ResolvedSerializer {
    pub(crate) fn serialize_typed(
        &self,
        value: &TypedPayload,
        ctx: &SerializationContext<'_>,
    ) -> Result<SerializedPayload> {
        self.serializer.serialize_typed(value, ctx, &self.pattern)
    }
}

/// A resolved deserializer.
pub(crate) struct ResolvedDeserializer {
    deserializer: Arc<dyn ErasedDeserializer>,
}

impl ResolvedDeserializer {
    pub(crate) fn deserialize_single(
        &self,
        payload: &SerializedPayload,
        ctx: &DeserializationContext<'_>,
    ) -> Result<Box<dyn Any + Send>> {
        self.deserializer.deserialize_single(payload, ctx)
    }

    pub(crate) fn deserialize_collection(
        &self,
        payload: &SerializedPayload,
        ctx: &DeserializationContext<'_>,
    ) -> Result<Box<dyn Any + Send>> {
        self.deserializer.deserialize_collection(payload, ctx)
    }
}

/// Shared registry of serializers and deserializers.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct SerdesRegistry {
    inner: Arc<RegistryInner>,
}

impl SerdesRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a serializer for `T` under its declared patterns.
    ///
    /// # Errors
    ///
    /// Returns a configuration fault when a declared pattern is
    /// malformed.
    pub fn register_serializer<T, S>(&self, serializer: S) -> Result<Registration>
    where
        T: Send + Sync + 'static,
        S: Serializer<T> + 'static,
    {
        self.put_serializer(Arc::new(serializer))
    }

    /// Registers a deserializer for `T` under its declared patterns.
    pub fn register_deserializer<T, D>(&self, deserializer: D) -> Result<Registration>
    where
        T: Send + Sync + 'static,
        D: Deserializer<T> + 'static,
    {
        self.put_deserializer(Arc::new(deserializer))
    }

    /// Registers both sides of a combined serdes in one step.
    pub fn register_serdes<T, S>(&self, serdes: S) -> Result<Registration>
    where
        T: Send + Sync + 'static,
        S: Serializer<T> + Deserializer<T> + 'static,
    {
        let serdes = Arc::new(serdes);
        let ser = self.put_serializer::<T, S>(Arc::clone(&serdes))?;
        let de = match self.put_deserializer::<T, S>(serdes) {
            Ok(de) => de,
            Err(err) => {
                ser.deregister();
                return Err(err);
            }
        };
        Ok(ser.merge(de))
    }

    fn put_serializer<T, S>(&self, serializer: Arc<S>) -> Result<Registration>
    where
        T: Send + Sync + 'static,
        S: Serializer<T> + 'static,
    {
        let patterns = parse_patterns(Serializer::media_types(serializer.as_ref()))?;
        let erased: Arc<dyn ErasedSerializer> = Arc::new(SerializerAdapter::<T, S> {
            inner: serializer,
            _marker: PhantomData,
        });
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.inner.serializers.write().expect("registry lock poisoned");
        for pattern in patterns {
            let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);
            entries.push(SerializerEntry {
                id,
                seq,
                type_id: TypeId::of::<T>(),
                pattern,
                serializer: Arc::clone(&erased),
            });
        }
        Ok(Registration::serializer(Arc::downgrade(&self.inner), id))
    }

    fn put_deserializer<T, D>(&self, deserializer: Arc<D>) -> Result<Registration>
    where
        T: Send + Sync + 'static,
        D: Deserializer<T> + 'static,
    {
        let patterns = parse_patterns(Deserializer::media_types(deserializer.as_ref()))?;
        let erased: Arc<dyn ErasedDeserializer> = Arc::new(DeserializerAdapter::<T, D> {
            inner: deserializer,
            _marker: PhantomData,
        });
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let mut entries = self
            .inner
            .deserializers
            .write()
            .expect("registry lock poisoned");
        for pattern in patterns {
            let seq = self.inner.next_seq.fetch_add(1, Ordering::SeqCst);
            entries.push(DeserializerEntry {
                id,
                seq,
                type_id: TypeId::of::<T>(),
                pattern,
                deserializer: Arc::clone(&erased),
            });
        }
        Ok(Registration::deserializer(Arc::downgrade(&self.inner), id))
    }

    /// Resolves the serializer for `(type, media type)`.
    ///
    /// # Errors
    ///
    /// A serialization fault when no registered pattern matches: a
    /// configuration problem, distinct from any transport error.
    pub(crate) fn serializer_for(
        &self,
        type_id: TypeId,
        type_name: &str,
        media_type: &MediaType,
    ) -> Result<ResolvedSerializer> {
        let entries = self.inner.serializers.read().expect("registry lock poisoned");
        entries
            .iter()
            .filter(|e| e.type_id == type_id && e.pattern.matches(media_type))
            .min_by_key(|e| (e.pattern.precedence(), e.seq))
            .map(|e| ResolvedSerializer {
                pattern: e.pattern.clone(),
                serializer: Arc::clone(&e.serializer),
            })
            .ok_or_else(|| {
                Error::serialization(SerializationError::no_serializer(
                    type_name,
                    media_type.to_string(),
                ))
            })
    }

    /// Resolves the deserializer for `(type, media type)`.
    pub(crate) fn deserializer_for(
        &self,
        type_id: TypeId,
        type_name: &str,
        media_type: &MediaType,
    ) -> Result<ResolvedDeserializer> {
        let entries = self
            .inner
            .deserializers
            .read()
            .expect("registry lock poisoned");
        entries
            .iter()
            .filter(|e| e.type_id == type_id && e.pattern.matches(media_type))
            .min_by_key(|e| (e.pattern.precedence(), e.seq))
            .map(|e| ResolvedDeserializer {
                deserializer: Arc::clone(&e.deserializer),
            })
            .ok_or_else(|| {
                Error::serialization(SerializationError::no_deserializer(
                    type_name,
                    media_type.to_string(),
                ))
            })
    }
}

fn parse_patterns(declared: Vec<String>) -> Result<Vec<MediaTypePattern>> {
    if declared.is_empty() {
        return Err(Error::configuration(
            "a serializer must declare at least one media type pattern",
        ));
    }
    declared
        .iter()
        .map(|p| MediaTypePattern::parse(p))
        .collect()
}

/// Handle for removing a registration from its registry.
///
/// Dropping the handle keeps the registration alive; call
/// [`Registration::deregister`] to remove it.
#[derive(Debug)]
pub struct Registration {
    registry: Weak<RegistryInner>,
    serializer_ids: Vec<u64>,
    deserializer_ids: Vec<u64>,
}

impl Registration {
    fn serializer(registry: Weak<RegistryInner>, id: u64) -> Self {
        Self {
            registry,
            serializer_ids: vec![id],
            deserializer_ids: Vec::new(),
        }
    }

    fn deserializer(registry: Weak<RegistryInner>, id: u64) -> Self {
        Self {
            registry,
            serializer_ids: Vec::new(),
            deserializer_ids: vec![id],
        }
    }

    fn merge(mut self, other: Registration) -> Self {
        self.serializer_ids.extend(other.serializer_ids);
        self.deserializer_ids.extend(other.deserializer_ids);
        self
    }

    /// Removes the registered entries from the registry.
    pub fn deregister(self) {
        let Some(inner) = self.registry.upgrade() else {
            return;
        };
        if !self.serializer_ids.is_empty() {
            let mut entries = inner.serializers.write().expect("registry lock poisoned");
            entries.retain(|e| !self.serializer_ids.contains(&e.id));
        }
        if !self.deserializer_ids.is_empty() {
            let mut entries = inner.deserializers.write().expect("registry lock poisoned");
            entries.retain(|e| !self.deserializer_ids.contains(&e.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::TextSerdes;

    fn media(s: &str) -> MediaType {
        s.parse().unwrap()
    }

    // A serializer stub distinguishable by its tag.
    struct Tagged {
        tag: &'static str,
        patterns: Vec<String>,
    }

    impl Tagged {
        fn new(tag: &'static str, patterns: &[&str]) -> Self {
            Self {
                tag,
                patterns: patterns.iter().map(|s| (*s).to_owned()).collect(),
            }
        }
    }

    impl Serializer<String> for Tagged {
        fn media_types(&self) -> Vec<String> {
            self.patterns.clone()
        }

        fn serialize(
            &self,
            _value: &String,
            _ctx: &SerializationContext<'_>,
        ) -> Result<SerializedPayload> {
            Ok(SerializedPayload::Text(self.tag.to_owned()))
        }

        fn serialize_collection(
            &self,
            _values: &[String],
            _ctx: &SerializationContext<'_>,
        ) -> Result<SerializedPayload> {
            Ok(SerializedPayload::Text(self.tag.to_owned()))
        }
    }

    fn resolve_tag(registry: &SerdesRegistry, target: &str) -> String {
        let resolved = registry
            .serializer_for(
                TypeId::of::<String>(),
                std::any::type_name::<String>(),
                &media(target),
            )
            .unwrap();
        let store = crate::store::Store::new();
        let mt = media(target);
        let ctx = SerializationContext::new(&mt, &store);
        let payload = TypedPayload::single("x".to_owned());
        match resolved.serialize_typed(&payload, &ctx).unwrap() {
            SerializedPayload::Text(tag) => tag,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn precedence_prefers_most_specific_pattern() {
        let registry = SerdesRegistry::new();
        registry
            .register_serializer::<String, _>(Tagged::new("any", &["*/*"]))
            .unwrap();
        registry
            .register_serializer::<String, _>(Tagged::new("text-any", &["text/*"]))
            .unwrap();
        registry
            .register_serializer::<String, _>(Tagged::new("plain", &["text/plain"]))
            .unwrap();

        assert_eq!(resolve_tag(&registry, "text/plain"), "plain");
        assert_eq!(resolve_tag(&registry, "text/html"), "text-any");
        assert_eq!(resolve_tag(&registry, "application/json"), "any");
    }

    #[test]
    fn subtype_wildcard_beats_full_wildcard() {
        let registry = SerdesRegistry::new();
        registry
            .register_serializer::<String, _>(Tagged::new("any", &["*/*"]))
            .unwrap();
        registry
            .register_serializer::<String, _>(Tagged::new("star-json", &["*/json"]))
            .unwrap();
        assert_eq!(resolve_tag(&registry, "application/json"), "star-json");
    }

    #[test]
    fn first_registrant_wins_ties() {
        let registry = SerdesRegistry::new();
        registry
            .register_serializer::<String, _>(Tagged::new("first", &["text/plain"]))
            .unwrap();
        registry
            .register_serializer::<String, _>(Tagged::new("second", &["text/plain"]))
            .unwrap();
        assert_eq!(resolve_tag(&registry, "text/plain"), "first");
    }

    #[test]
    fn missing_entry_is_a_serialization_fault() {
        let registry = SerdesRegistry::new();
        let err = registry
            .serializer_for(
                TypeId::of::<u32>(),
                std::any::type_name::<u32>(),
                &media("application/json"),
            )
            .unwrap_err();
        assert!(err.as_serialization().is_some());
    }

    #[test]
    fn malformed_pattern_is_rejected_at_registration() {
        let registry = SerdesRegistry::new();
        let err = registry
            .register_serializer::<String, _>(Tagged::new("bad", &["no-separator"]))
            .unwrap_err();
        assert!(err.as_configuration().is_some());
    }

    #[test]
    fn deregistration_removes_entries() {
        let registry = SerdesRegistry::new();
        let registration = registry.register_serdes::<String, _>(TextSerdes::new()).unwrap();
        assert!(registry
            .serializer_for(
                TypeId::of::<String>(),
                std::any::type_name::<String>(),
                &media("text/plain"),
            )
            .is_ok());
        registration.deregister();
        assert!(registry
            .serializer_for(
                TypeId::of::<String>(),
                std::any::type_name::<String>(),
                &media("text/plain"),
            )
            .is_err());
    }
}
