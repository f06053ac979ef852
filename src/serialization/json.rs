//! JSON serdes backed by serde.

use super::{DeserializationContext, Deserializer, SerializationContext, Serializer};
use crate::error::{Error, Result, SerializationError};
use crate::payload::SerializedPayload;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// JSON serializer/deserializer for any serde-enabled type.
///
/// Registered by default under `application/json` and `*/json`, which
/// also covers suffixed JSON subtypes matched through the wildcard tier.
///
/// # Example
///
/// ```rust
/// use courier_core::serialization::{JsonSerdes, SerdesRegistry};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Person {
///     name: String,
/// }
///
/// let registry = SerdesRegistry::new();
/// registry.register_serdes::<Person, _>(JsonSerdes::new()).unwrap();
/// ```
pub struct JsonSerdes<T> {
    patterns: Vec<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerdes<T> {
    /// Creates the serdes with the default JSON patterns.
    pub fn new() -> Self {
        Self::with_patterns(&["application/json", "*/json"])
    }

    /// Creates the serdes with custom media-type patterns.
    pub fn with_patterns(patterns: &[&str]) -> Self {
        Self {
            patterns: patterns.iter().map(|p| (*p).to_owned()).collect(),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerdes<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn codec_error<T, E: std::fmt::Display>(detail: E) -> Error {
    Error::serialization(SerializationError::codec(
        std::any::type_name::<T>(),
        "application/json",
        detail.to_string(),
    ))
}

impl<T> Serializer<T> for JsonSerdes<T>
where
    T: Serialize + Send + Sync,
{
    fn media_types(&self) -> Vec<String> {
        self.patterns.clone()
    }

    fn serialize(&self, value: &T, _ctx: &SerializationContext<'_>) -> Result<SerializedPayload> {
        let text = serde_json::to_string(value).map_err(codec_error::<T, _>)?;
        Ok(SerializedPayload::Text(text))
    }

    fn serialize_collection(
        &self,
        values: &[T],
        _ctx: &SerializationContext<'_>,
    ) -> Result<SerializedPayload> {
        let text = serde_json::to_string(values).map_err(codec_error::<T, _>)?;
        Ok(SerializedPayload::Text(text))
    }
}

impl<T> Deserializer<T> for JsonSerdes<T>
where
    T: DeserializeOwned + Send + Sync,
{
    fn media_types(&self) -> Vec<String> {
        self.patterns.clone()
    }

    fn deserialize(
        &self,
        payload: &SerializedPayload,
        _ctx: &DeserializationContext<'_>,
    ) -> Result<T> {
        serde_json::from_slice(payload.bytes()).map_err(codec_error::<T, _>)
    }

    fn deserialize_collection(
        &self,
        payload: &SerializedPayload,
        _ctx: &DeserializationContext<'_>,
    ) -> Result<Vec<T>> {
        serde_json::from_slice(payload.bytes()).map_err(codec_error::<T, _>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use crate::store::Store;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
    struct Person {
        id: u32,
        name: String,
    }

    fn ctx_parts() -> (MediaType, Store) {
        ("application/json".parse().unwrap(), Store::new())
    }

    #[test]
    fn serializes_deterministically() {
        let (media, store) = ctx_parts();
        let ctx = SerializationContext::new(&media, &store);
        let serdes = JsonSerdes::<Person>::new();
        let person = Person {
            id: 1,
            name: "Ada".to_owned(),
        };
        let wire = serdes.serialize(&person, &ctx).unwrap();
        assert_eq!(wire.as_text(), Some(r#"{"id":1,"name":"Ada"}"#));
    }

    #[test]
    fn collection_serializes_as_array() {
        let (media, store) = ctx_parts();
        let ctx = SerializationContext::new(&media, &store);
        let serdes = JsonSerdes::<Person>::new();
        let people = vec![
            Person {
                id: 1,
                name: "Ada".to_owned(),
            },
            Person {
                id: 2,
                name: "Grace".to_owned(),
            },
        ];
        let wire = serdes.serialize_collection(&people, &ctx).unwrap();
        assert_eq!(
            wire.as_text(),
            Some(r#"[{"id":1,"name":"Ada"},{"id":2,"name":"Grace"}]"#)
        );
    }

    #[test]
    fn malformed_input_is_a_codec_fault() {
        let serdes = JsonSerdes::<Person>::new();
        // Deserialization contexts are only reachable through the
        // pipeline; exercise the codec path directly instead.
        let err = serde_json::from_slice::<Person>(b"not json").unwrap_err();
        let err = codec_error::<Person, _>(err);
        assert!(err.as_serialization().is_some());
        let _ = serdes;
    }
}
