//! URL-encoded form payloads.

use super::{SerializationContext, Serializer};
use crate::error::Result;
use crate::payload::SerializedPayload;
use url::form_urlencoded;

/// An ordered list of form fields.
///
/// # Example
///
/// ```rust
/// use courier_core::serialization::FormData;
///
/// let form = FormData::new()
///     .append("name", "Ada Lovelace")
///     .append("role", "engineer");
/// assert_eq!(form.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field. Duplicate names are kept; forms are multimaps.
    #[must_use]
    pub fn append(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// Serializer for [`FormData`] under
/// `application/x-www-form-urlencoded`. Serialization only; form bodies
/// are a request-side format.
#[derive(Debug, Clone, Default)]
pub struct FormUrlEncodedSerializer;

impl FormUrlEncodedSerializer {
    /// Creates the serializer.
    pub fn new() -> Self {
        Self
    }
}

impl Serializer<FormData> for FormUrlEncodedSerializer {
    fn media_types(&self) -> Vec<String> {
        vec!["application/x-www-form-urlencoded".to_owned()]
    }

    fn serialize(
        &self,
        value: &FormData,
        _ctx: &SerializationContext<'_>,
    ) -> Result<SerializedPayload> {
        let mut encoder = form_urlencoded::Serializer::new(String::new());
        for (name, val) in value.iter() {
            encoder.append_pair(name, val);
        }
        Ok(SerializedPayload::Text(encoder.finish()))
    }

    fn serialize_collection(
        &self,
        values: &[FormData],
        ctx: &SerializationContext<'_>,
    ) -> Result<SerializedPayload> {
        // Multiple forms concatenate into one field list.
        let mut merged = FormData::new();
        for form in values {
            for (name, val) in form.iter() {
                merged = merged.append(name, val);
            }
        }
        self.serialize(&merged, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaType;
    use crate::store::Store;

    #[test]
    fn encodes_pairs_with_escaping() {
        let media: MediaType = "application/x-www-form-urlencoded".parse().unwrap();
        let store = Store::new();
        let ctx = SerializationContext::new(&media, &store);
        let form = FormData::new()
            .append("name", "Ada Lovelace")
            .append("tag", "a&b");
        let wire = FormUrlEncodedSerializer::new().serialize(&form, &ctx).unwrap();
        assert_eq!(wire.as_text(), Some("name=Ada+Lovelace&tag=a%26b"));
    }
}
