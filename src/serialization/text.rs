//! Plain-text serdes for `String` payloads.

use super::{DeserializationContext, Deserializer, SerializationContext, Serializer};
use crate::error::{Error, Result, SerializationError};
use crate::payload::SerializedPayload;

/// Passthrough serdes for `String` under `text/plain`, with a `*/*`
/// fallback so unadorned text round-trips without extra registration.
#[derive(Debug, Clone, Default)]
pub struct TextSerdes;

impl TextSerdes {
    /// Creates the serdes.
    pub fn new() -> Self {
        Self
    }
}

impl Serializer<String> for TextSerdes {
    fn media_types(&self) -> Vec<String> {
        vec!["text/plain".to_owned(), "*/*".to_owned()]
    }

    fn serialize(
        &self,
        value: &String,
        _ctx: &SerializationContext<'_>,
    ) -> Result<SerializedPayload> {
        Ok(SerializedPayload::Text(value.clone()))
    }

    fn serialize_collection(
        &self,
        values: &[String],
        _ctx: &SerializationContext<'_>,
    ) -> Result<SerializedPayload> {
        Ok(SerializedPayload::Text(values.join("\n")))
    }
}

impl Deserializer<String> for TextSerdes {
    fn media_types(&self) -> Vec<String> {
        vec!["text/plain".to_owned(), "*/*".to_owned()]
    }

    fn deserialize(
        &self,
        payload: &SerializedPayload,
        _ctx: &DeserializationContext<'_>,
    ) -> Result<String> {
        Ok(String::from_utf8_lossy(payload.bytes()).into_owned())
    }

    fn deserialize_collection(
        &self,
        _payload: &SerializedPayload,
        _ctx: &DeserializationContext<'_>,
    ) -> Result<Vec<String>> {
        // Plain text has no collection grammar to split on.
        Err(Error::serialization(SerializationError::codec(
            "String",
            "text/plain",
            "plain text does not support collection deserialization",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use crate::store::Store;

    #[test]
    fn text_round_trips_as_is() {
        let media: MediaType = "text/plain".parse().unwrap();
        let store = Store::new();
        let ctx = SerializationContext::new(&media, &store);
        let wire = TextSerdes::new()
            .serialize(&"hello".to_owned(), &ctx)
            .unwrap();
        assert_eq!(wire.as_text(), Some("hello"));
    }

    #[test]
    fn collection_serializes_line_separated() {
        let media: MediaType = "text/plain".parse().unwrap();
        let store = Store::new();
        let ctx = SerializationContext::new(&media, &store);
        let wire = TextSerdes::new()
            .serialize_collection(&["a".to_owned(), "b".to_owned()], &ctx)
            .unwrap();
        assert_eq!(wire.as_text(), Some("a\nb"));
    }
}
