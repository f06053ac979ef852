//! Outbound serialization and inbound media-type negotiation.

use super::{SerdesRegistry, SerializationContext};
use crate::error::Result;
use crate::media::MediaType;
use crate::payload::RequestPayload;
use crate::request::MutableRequest;
use crate::response::RawResponse;
use tracing::debug;

/// Translates typed request payloads into wire form and negotiates the
/// media type of incoming responses.
#[derive(Clone)]
pub struct SerializationEngine {
    registry: SerdesRegistry,
}

impl SerializationEngine {
    pub(crate) fn new(registry: SerdesRegistry) -> Self {
        Self { registry }
    }

    pub(crate) fn registry(&self) -> &SerdesRegistry {
        &self.registry
    }

    /// Serializes the request payload in place.
    ///
    /// Absent payloads produce an empty body; already-serialized payloads
    /// pass through untouched. Typed payloads resolve a serializer by the
    /// declared Content-Type (defaulting to `*/*`) and element type.
    ///
    /// # Errors
    ///
    /// A serialization fault when no serializer matches, a configuration
    /// fault when the Content-Type header is malformed.
    pub fn serialize_request(&self, request: &mut MutableRequest) -> Result<()> {
        let typed = match request.payload() {
            RequestPayload::Typed(typed) => typed.clone(),
            RequestPayload::Absent | RequestPayload::Serialized { .. } => return Ok(()),
        };

        let media_type = request.content_type()?;
        let resolved =
            self.registry
                .serializer_for(typed.type_id(), typed.type_name(), &media_type)?;

        let store = request.store().clone();
        let ctx = SerializationContext::new(&media_type, &store);
        let wire = resolved.serialize_typed(&typed, &ctx)?;

        debug!(
            media_type = %media_type,
            payload_type = typed.type_name(),
            bytes = wire.len(),
            "request payload serialized"
        );
        request.payload_mut().mark_serialized(wire);
        Ok(())
    }

    /// The media type deserializers are matched against for a response.
    ///
    /// Falls back to `*/*`, with a diagnostic, when the response has no
    /// usable Content-Type.
    pub fn negotiated_media_type(response: &RawResponse) -> MediaType {
        match response.content_type() {
            Some(media_type) => media_type,
            None => {
                debug!(
                    status = response.status().as_u16(),
                    "response carries no Content-Type; matching deserializers against */*"
                );
                MediaType::any()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::Headers;
    use crate::payload::{SerializedPayload, TypedPayload};
    use crate::request::RequestSnapshot;
    use crate::serialization::TextSerdes;
    use crate::store::Store;
    use http::{Method, StatusCode};
    use url::Url;

    fn engine_with_text() -> SerializationEngine {
        let registry = SerdesRegistry::new();
        registry.register_serdes::<String, _>(TextSerdes::new()).unwrap();
        SerializationEngine::new(registry)
    }

    fn request() -> MutableRequest {
        let snapshot = RequestSnapshot::for_test(
            Method::POST,
            Url::parse("http://localhost/notes").unwrap(),
        );
        MutableRequest::from_snapshot(&snapshot, Store::new().leaf())
    }

    #[test]
    fn absent_payload_stays_empty() {
        let engine = engine_with_text();
        let mut req = request();
        engine.serialize_request(&mut req).unwrap();
        assert!(req.payload().wire().is_absent());
    }

    #[test]
    fn typed_payload_is_serialized_once() {
        let engine = engine_with_text();
        let mut req = request();
        req.set_payload(RequestPayload::Typed(TypedPayload::single("note".to_owned())));
        engine.serialize_request(&mut req).unwrap();
        assert_eq!(req.payload().wire().as_text(), Some("note"));
        assert!(req.payload().is_serialized());

        // A second pass leaves the wire form untouched.
        engine.serialize_request(&mut req).unwrap();
        assert_eq!(req.payload().wire().as_text(), Some("note"));
    }

    #[test]
    fn missing_serializer_surfaces_as_serialization_fault() {
        let engine = engine_with_text();
        let mut req = request();
        req.set_payload(RequestPayload::Typed(TypedPayload::single(42u64)));
        let err = engine.serialize_request(&mut req).unwrap_err();
        assert!(err.as_serialization().is_some());
    }

    #[test]
    fn missing_content_type_negotiates_as_wildcard() {
        let raw = RawResponse::new(StatusCode::OK, Headers::new(), SerializedPayload::Absent);
        assert_eq!(
            SerializationEngine::negotiated_media_type(&raw).to_string(),
            "*/*"
        );
    }
}
