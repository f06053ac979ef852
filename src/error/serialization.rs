//! Serialization fault details.

use std::fmt;

/// What went wrong inside the serialization layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SerializationErrorKind {
    /// No serializer registered for the (type, media type) pair.
    NoSerializer,
    /// No deserializer registered for the (type, media type) pair.
    NoDeserializer,
    /// A registered codec failed to encode or decode the payload.
    Codec,
    /// A registry entry produced a value of an unexpected type.
    TypeMismatch,
}

/// Detail struct for [`Error::Serialization`](super::Error::Serialization).
///
/// Carries the requested type name and media type so the fault message can
/// point at the exact missing registration.
#[derive(Debug, Clone)]
pub struct SerializationError {
    kind: SerializationErrorKind,
    type_name: String,
    media_type: String,
    detail: Option<String>,
}

impl SerializationError {
    /// No serializer registered for `type_name` under `media_type`.
    pub fn no_serializer(type_name: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            kind: SerializationErrorKind::NoSerializer,
            type_name: type_name.into(),
            media_type: media_type.into(),
            detail: None,
        }
    }

    /// No deserializer registered for `type_name` under `media_type`.
    pub fn no_deserializer(type_name: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            kind: SerializationErrorKind::NoDeserializer,
            type_name: type_name.into(),
            media_type: media_type.into(),
            detail: None,
        }
    }

    /// A codec failure while encoding or decoding `type_name`.
    pub fn codec(
        type_name: impl Into<String>,
        media_type: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: SerializationErrorKind::Codec,
            type_name: type_name.into(),
            media_type: media_type.into(),
            detail: Some(detail.into()),
        }
    }

    /// A registry entry handed back a value of the wrong type.
    pub fn type_mismatch(type_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: SerializationErrorKind::TypeMismatch,
            type_name: type_name.into(),
            media_type: String::new(),
            detail: Some(detail.into()),
        }
    }

    /// The fault kind.
    pub fn kind(&self) -> SerializationErrorKind {
        self.kind
    }

    /// The payload type the lookup or codec was working with.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The negotiated media type, if relevant to the fault.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SerializationErrorKind::NoSerializer => write!(
                f,
                "no serializer registered for type `{}` and media type `{}`",
                self.type_name, self.media_type
            )?,
            SerializationErrorKind::NoDeserializer => write!(
                f,
                "no deserializer registered for type `{}` and media type `{}`",
                self.type_name, self.media_type
            )?,
            SerializationErrorKind::Codec => write!(
                f,
                "codec failure for type `{}` under media type `{}`",
                self.type_name, self.media_type
            )?,
            SerializationErrorKind::TypeMismatch => {
                write!(f, "registry entry for `{}` produced a mismatched type", self.type_name)?;
            }
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SerializationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_type_and_media_type() {
        let err = SerializationError::no_deserializer("Person", "application/json");
        let msg = err.to_string();
        assert!(msg.contains("Person"));
        assert!(msg.contains("application/json"));
        assert_eq!(err.kind(), SerializationErrorKind::NoDeserializer);
    }
}
