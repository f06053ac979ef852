//! Request and response payload representations.
//!
//! Two layers exist on purpose. [`SerializedPayload`] is the closed wire
//! union (absent, text or raw bytes) and is all the transport ever sees.
//! [`TypedPayload`] is a type-erased domain value still waiting for the
//! serialization engine; anything richer than the closed union (forms,
//! documents, custom object graphs) enters the core as a typed value plus
//! a matching serializer registration.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// Wire form of a payload: absent, text, or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SerializedPayload {
    /// No body.
    #[default]
    Absent,
    /// A textual body.
    Text(String),
    /// A binary body.
    Bytes(Vec<u8>),
}

impl SerializedPayload {
    /// Whether there is no body.
    pub fn is_absent(&self) -> bool {
        matches!(self, SerializedPayload::Absent)
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        match self {
            SerializedPayload::Absent => 0,
            SerializedPayload::Text(s) => s.len(),
            SerializedPayload::Bytes(b) => b.len(),
        }
    }

    /// Whether the body is empty (absent or zero-length).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The body as text, if it is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SerializedPayload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The body as raw bytes. Text payloads expose their UTF-8 bytes;
    /// absent payloads an empty slice.
    pub fn bytes(&self) -> &[u8] {
        match self {
            SerializedPayload::Absent => &[],
            SerializedPayload::Text(s) => s.as_bytes(),
            SerializedPayload::Bytes(b) => b,
        }
    }
}

impl From<String> for SerializedPayload {
    fn from(s: String) -> Self {
        SerializedPayload::Text(s)
    }
}

impl From<&str> for SerializedPayload {
    fn from(s: &str) -> Self {
        SerializedPayload::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for SerializedPayload {
    fn from(b: Vec<u8>) -> Self {
        SerializedPayload::Bytes(b)
    }
}

/// A type-erased domain value pending serialization.
///
/// Keeps the element `TypeId` and type name so the serdes registry can
/// find the right serializer without reflection. Collections are stored
/// as `Vec<T>` behind the same erasure, flagged so the engine knows to
/// use the collection variant of the serializer.
#[derive(Clone)]
pub struct TypedPayload {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
    collection: bool,
}

impl TypedPayload {
    /// Wraps a single value of type `T`.
    pub fn single<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            collection: false,
        }
    }

    /// Wraps a collection of values of element type `T`.
    pub fn collection<T: Send + Sync + 'static>(values: Vec<T>) -> Self {
        Self {
            value: Arc::new(values),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            collection: true,
        }
    }

    /// The element type id used for serializer lookup.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The element type name, for diagnostics and fault messages.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether this wraps a collection.
    pub fn is_collection(&self) -> bool {
        self.collection
    }

    /// Downcasts a single value back to `T`.
    pub fn downcast_single<T: 'static>(&self) -> Option<&T> {
        if self.collection {
            return None;
        }
        self.value.downcast_ref::<T>()
    }

    /// Downcasts a collection back to `Vec<T>`.
    pub fn downcast_collection<T: 'static>(&self) -> Option<&Vec<T>> {
        if !self.collection {
            return None;
        }
        self.value.downcast_ref::<Vec<T>>()
    }
}

impl fmt::Debug for TypedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedPayload")
            .field("type_name", &self.type_name)
            .field("collection", &self.collection)
            .finish()
    }
}

/// Payload of an outgoing request as it moves through the pipeline.
///
/// Starts absent or typed; the serialize stage turns a typed payload into
/// `Serialized`, after which the wire form is authoritative and the typed
/// value is retained only for diagnostics.
#[derive(Debug, Clone, Default)]
pub enum RequestPayload {
    /// No payload.
    #[default]
    Absent,
    /// A typed value not yet serialized.
    Typed(TypedPayload),
    /// The serialized wire form, plus the originating typed value.
    Serialized {
        /// Authoritative wire form.
        wire: SerializedPayload,
        /// The typed value the wire form came from, diagnostics only.
        source: Option<TypedPayload>,
    },
}

impl RequestPayload {
    /// Whether serialization has produced the wire form.
    pub fn is_serialized(&self) -> bool {
        matches!(self, RequestPayload::Serialized { .. })
    }

    /// The typed value, when one is still pending serialization.
    pub fn typed(&self) -> Option<&TypedPayload> {
        match self {
            RequestPayload::Typed(t) => Some(t),
            _ => None,
        }
    }

    /// The wire form. Absent payloads read as an empty body.
    pub fn wire(&self) -> SerializedPayload {
        match self {
            RequestPayload::Absent | RequestPayload::Typed(_) => SerializedPayload::Absent,
            RequestPayload::Serialized { wire, .. } => wire.clone(),
        }
    }

    /// Marks this payload serialized, keeping the typed source around
    /// for diagnostics.
    pub fn mark_serialized(&mut self, wire: SerializedPayload) {
        let source = match std::mem::take(self) {
            RequestPayload::Typed(t) => Some(t),
            RequestPayload::Serialized { source, .. } => source,
            RequestPayload::Absent => None,
        };
        *self = RequestPayload::Serialized { wire, source };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_payload_downcasts() {
        let single = TypedPayload::single(42u32);
        assert_eq!(single.downcast_single::<u32>(), Some(&42));
        assert!(single.downcast_single::<i64>().is_none());
        assert!(single.downcast_collection::<u32>().is_none());

        let many = TypedPayload::collection(vec![1u32, 2, 3]);
        assert!(many.is_collection());
        assert_eq!(many.downcast_collection::<u32>(), Some(&vec![1, 2, 3]));
        assert!(many.downcast_single::<u32>().is_none());
    }

    #[test]
    fn serialized_wire_is_authoritative() {
        let mut payload = RequestPayload::Typed(TypedPayload::single("hello".to_owned()));
        assert!(!payload.is_serialized());
        assert!(payload.wire().is_absent());

        payload.mark_serialized("\"hello\"".into());
        assert!(payload.is_serialized());
        assert_eq!(payload.wire().as_text(), Some("\"hello\""));
        // The typed source survives for diagnostics.
        match &payload {
            RequestPayload::Serialized { source, .. } => assert!(source.is_some()),
            _ => unreachable!(),
        }
    }

    #[test]
    fn wire_forms() {
        assert_eq!(SerializedPayload::from("x").bytes(), b"x");
        assert_eq!(SerializedPayload::from(vec![1u8, 2]).len(), 2);
        assert!(SerializedPayload::Absent.is_empty());
    }
}
