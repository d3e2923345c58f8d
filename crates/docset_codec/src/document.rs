//! Wire shape of a stored document.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Wire name of the document id.
pub const ID_FIELD: &str = "_id";
/// Wire name of the store-assigned revision token.
pub const REV_FIELD: &str = "_rev";
/// Wire name of the document type discriminator.
pub const DOCUMENT_TYPE_FIELD: &str = "DocumentType";
/// Wire name of the deletion flag.
pub const DELETED_FIELD: &str = "_deleted";

/// Field names that belong to the document envelope rather than its body.
pub const RESERVED_FIELDS: [&str; 4] = [ID_FIELD, REV_FIELD, DOCUMENT_TYPE_FIELD, DELETED_FIELD];

/// A document as it travels to and from the store.
///
/// Every persisted document carries `_id`, `_rev` (store-assigned),
/// `DocumentType` and its body fields. A deletion is the envelope alone
/// with `_deleted: true`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    /// Stable document id.
    pub id: String,
    /// Revision token, `None` before the first write.
    pub rev: Option<String>,
    /// Logical collection the document belongs to.
    pub document_type: String,
    /// Deletion marker.
    pub deleted: bool,
    /// Body fields.
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    /// Creates an empty document.
    pub fn new(id: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            document_type: document_type.into(),
            ..Self::default()
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Builder-style revision setter.
    #[must_use]
    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    /// Projects this document down to its deletion stub.
    #[must_use]
    pub fn to_deletion_stub(&self) -> Self {
        Self {
            id: self.id.clone(),
            rev: self.rev.clone(),
            document_type: self.document_type.clone(),
            deleted: true,
            fields: BTreeMap::new(),
        }
    }

    /// Returns true if `name` is an envelope field.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_FIELDS.contains(&name)
    }

    /// Resolves a field by its wire name, including envelope fields.
    pub fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        match name {
            ID_FIELD => Some(Cow::Owned(Value::Text(self.id.clone()))),
            REV_FIELD => self.rev.clone().map(|r| Cow::Owned(Value::Text(r))),
            DOCUMENT_TYPE_FIELD => Some(Cow::Owned(Value::Text(self.document_type.clone()))),
            DELETED_FIELD => self.deleted.then(|| Cow::Owned(Value::Bool(true))),
            _ => self.fields.get(name).map(Cow::Borrowed),
        }
    }

    /// Converts to the flat wire map.
    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert(ID_FIELD.into(), Value::Text(self.id.clone()));
        if let Some(rev) = &self.rev {
            map.insert(REV_FIELD.into(), Value::Text(rev.clone()));
        }
        map.insert(
            DOCUMENT_TYPE_FIELD.into(),
            Value::Text(self.document_type.clone()),
        );
        if self.deleted {
            map.insert(DELETED_FIELD.into(), Value::Bool(true));
        }
        Value::Map(map)
    }

    /// Parses a flat wire map.
    ///
    /// # Errors
    ///
    /// Fails if the value is not a map, `_id` is missing, or an envelope
    /// field has the wrong type.
    pub fn from_value(value: Value) -> CodecResult<Self> {
        let Value::Map(mut map) = value else {
            return Err(CodecError::invalid_document("expected map"));
        };

        let id = match map.remove(ID_FIELD) {
            Some(Value::Text(id)) => id,
            Some(_) => return Err(CodecError::invalid_document("_id must be text")),
            None => return Err(CodecError::invalid_document("missing _id")),
        };
        let rev = match map.remove(REV_FIELD) {
            Some(Value::Text(rev)) => Some(rev),
            None | Some(Value::Null) => None,
            Some(_) => return Err(CodecError::invalid_document("_rev must be text")),
        };
        let document_type = match map.remove(DOCUMENT_TYPE_FIELD) {
            Some(Value::Text(t)) => t,
            None | Some(Value::Null) => String::new(),
            Some(_) => return Err(CodecError::invalid_document("DocumentType must be text")),
        };
        let deleted = match map.remove(DELETED_FIELD) {
            Some(Value::Bool(b)) => b,
            None | Some(Value::Null) => false,
            Some(_) => return Err(CodecError::invalid_document("_deleted must be a bool")),
        };

        Ok(Self {
            id,
            rev,
            document_type,
            deleted,
            fields: map,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_map_carries_envelope() {
        let doc = Document::new("Contacts/James/DeMeuse", "Contacts")
            .with_rev("1-abc")
            .with_field("firstName", "James");

        let wire = doc.to_value();
        assert_eq!(
            wire.get(ID_FIELD).and_then(Value::as_text),
            Some("Contacts/James/DeMeuse")
        );
        assert_eq!(wire.get(REV_FIELD).and_then(Value::as_text), Some("1-abc"));
        assert_eq!(
            wire.get(DOCUMENT_TYPE_FIELD).and_then(Value::as_text),
            Some("Contacts")
        );
        assert_eq!(wire.get(DELETED_FIELD), None);
        assert_eq!(Document::from_value(wire).unwrap(), doc);
    }

    #[test]
    fn deletion_stub_strips_body() {
        let doc = Document::new("a", "Notes")
            .with_rev("3-x")
            .with_field("contents", "hello");
        let stub = doc.to_deletion_stub();

        assert!(stub.deleted);
        assert!(stub.fields.is_empty());
        assert_eq!(stub.rev.as_deref(), Some("3-x"));
        assert_eq!(stub.document_type, "Notes");
        assert_eq!(
            stub.to_value().get(DELETED_FIELD),
            Some(&Value::Bool(true))
        );
    }

    #[test]
    fn field_resolves_envelope_names() {
        let doc = Document::new("a", "Notes").with_field("title", "t");
        assert_eq!(doc.field(ID_FIELD).unwrap().as_text(), Some("a"));
        assert_eq!(
            doc.field(DOCUMENT_TYPE_FIELD).unwrap().as_text(),
            Some("Notes")
        );
        assert!(doc.field(REV_FIELD).is_none());
        assert!(doc.field(DELETED_FIELD).is_none());
        assert_eq!(doc.field("title").unwrap().as_text(), Some("t"));
    }

    #[test]
    fn from_value_rejects_bad_envelopes() {
        assert!(Document::from_value(Value::Integer(1)).is_err());
        assert!(Document::from_value(Value::map([("x", 1i64)])).is_err());
        assert!(Document::from_value(Value::map([(ID_FIELD, 1i64)])).is_err());
        let bad_rev = Value::map([
            (ID_FIELD, Value::from("a")),
            (REV_FIELD, Value::Integer(1)),
        ]);
        assert!(Document::from_value(bad_rev).is_err());
    }

    #[test]
    fn reserved_names() {
        assert!(Document::is_reserved("_id"));
        assert!(Document::is_reserved("DocumentType"));
        assert!(!Document::is_reserved("id"));
    }
}
