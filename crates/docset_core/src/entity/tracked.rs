//! Field-level change tracking.

use docset_codec::{Document, Value};
use std::collections::BTreeMap;

/// Writing this field flags the entity dirty without changing any field.
pub const DIRTY_MARKER: &str = "__isDirty";

/// Reading this field reports whether the entity is tracked.
pub const TRACKED_MARKER: &str = "__isTracked";

static NULL: Value = Value::Null;
static TRACKED: Value = Value::Bool(true);

/// An entity: body fields plus the `id`, `rev` and `document_type` envelope.
///
/// Every write through [`Entity::set`] on an entity that already has an id
/// records the field's previous value in a pristine snapshot, the first time
/// that field changes. The entity is dirty while any snapshot value differs
/// from the live one. Dirtiness is recomputed on every call, so setting a
/// field back to its original value makes the entity clean again.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    id: Option<String>,
    rev: Option<String>,
    document_type: String,
    fields: BTreeMap<String, Value>,
    pristine: Option<BTreeMap<String, Value>>,
    force_dirty: bool,
    tracked: bool,
}

impl Entity {
    /// Creates an empty draft of the given document type.
    pub fn new(document_type: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            ..Self::default()
        }
    }

    /// Creates a draft with a caller-chosen id, bypassing key derivation.
    pub fn with_id(document_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(document_type)
        }
    }

    /// Builds an (untracked) entity from a stored document.
    pub fn from_document(doc: Document) -> Self {
        Self {
            id: Some(doc.id),
            rev: doc.rev,
            document_type: doc.document_type,
            fields: doc.fields,
            ..Self::default()
        }
    }

    /// Builder-style field initialiser; never recorded in the snapshot.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if Self::is_writable(&name) {
            self.fields.insert(name, value.into());
        }
        self
    }

    /// Builder-style initialiser from a JSON-like map value.
    ///
    /// Non-map values are ignored.
    #[must_use]
    pub fn with_fields(mut self, value: impl Into<Value>) -> Self {
        if let Value::Map(map) = value.into() {
            for (name, value) in map {
                if Self::is_writable(&name) {
                    self.fields.insert(name, value);
                }
            }
        }
        self
    }

    /// Returns the entity id, if assigned.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the revision of the last successful write.
    pub fn rev(&self) -> Option<&str> {
        self.rev.as_deref()
    }

    /// Returns the document type.
    pub fn document_type(&self) -> &str {
        &self.document_type
    }

    /// Returns the body fields.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Reads a field.
    ///
    /// [`TRACKED_MARKER`] reads as `true` while the entity is tracked.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if name == TRACKED_MARKER {
            return self.tracked.then_some(&TRACKED);
        }
        self.fields.get(name)
    }

    /// Writes a field, recording its previous value on first change.
    ///
    /// Writing [`DIRTY_MARKER`] flags the entity dirty and changes nothing
    /// else. Envelope names (`_id`, `_rev`, `DocumentType`, `_deleted`) and
    /// [`TRACKED_MARKER`] are not writable and are ignored.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if name == DIRTY_MARKER {
            self.force_dirty = true;
            return;
        }
        if !Self::is_writable(&name) {
            tracing::warn!(field = %name, "ignoring write to reserved field");
            return;
        }
        self.record_original(&name);
        self.fields.insert(name, value.into());
    }

    /// Removes a field, recording its previous value on first change.
    ///
    /// An absent field compares equal to `null`.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        if !Self::is_writable(name) {
            return None;
        }
        self.record_original(name);
        self.fields.remove(name)
    }

    /// Flags the entity dirty regardless of its field values.
    pub fn mark_dirty(&mut self) {
        self.force_dirty = true;
    }

    /// Returns true if the entity has unsaved field changes.
    pub fn is_dirty(&self) -> bool {
        if self.force_dirty {
            return true;
        }
        self.pristine.as_ref().is_some_and(|pristine| {
            pristine.iter().any(|(name, original)| {
                !original.loosely_equals(self.fields.get(name).unwrap_or(&NULL))
            })
        })
    }

    /// Returns true while the entity is in the attachment registry.
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    /// Returns the recorded pre-mutation values, if any field changed.
    pub fn pristine(&self) -> Option<&BTreeMap<String, Value>> {
        self.pristine.as_ref()
    }

    /// Projects the entity to its wire document. An unassigned id encodes as empty.
    pub fn to_document(&self) -> Document {
        Document {
            id: self.id.clone().unwrap_or_default(),
            rev: self.rev.clone(),
            document_type: self.document_type.clone(),
            deleted: false,
            fields: self.fields.clone(),
        }
    }

    fn is_writable(name: &str) -> bool {
        !Document::is_reserved(name) && name != TRACKED_MARKER && name != DIRTY_MARKER
    }

    fn record_original(&mut self, name: &str) {
        if self.id.is_none() {
            return;
        }
        let pristine = self.pristine.get_or_insert_with(BTreeMap::new);
        if !pristine.contains_key(name) {
            let current = self.fields.get(name).cloned().unwrap_or(Value::Null);
            pristine.insert(name.to_string(), current);
        }
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }

    pub(crate) fn set_document_type(&mut self, document_type: &str) {
        self.document_type = document_type.to_string();
    }

    pub(crate) fn set_tracked(&mut self, tracked: bool) {
        self.tracked = tracked;
    }

    /// Writes a field without touching the snapshot.
    pub(crate) fn put_untracked(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Applies the revision of a successful write and starts a fresh
    /// tracking session.
    pub(crate) fn commit_revision(&mut self, rev: String) {
        self.rev = Some(rev);
        self.pristine = None;
        self.force_dirty = false;
    }

    /// Replaces the body and revision with a newer stored version.
    pub(crate) fn reload(&mut self, doc: Document) {
        self.rev = doc.rev;
        self.fields = doc.fields;
        self.pristine = None;
        self.force_dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn saved(id: &str) -> Entity {
        Entity::from_document(
            Document::new(id, "Contacts")
                .with_rev("1-a")
                .with_field("firstName", "James")
                .with_field("tags", vec!["a", "b"]),
        )
    }

    #[test]
    fn drafts_do_not_snapshot() {
        let mut entity = Entity::new("Contacts");
        entity.set("firstName", "James");
        assert!(entity.pristine().is_none());
        assert!(!entity.is_dirty());
    }

    #[test]
    fn first_write_wins() {
        let mut entity = saved("c1");
        entity.set("firstName", "Jim");
        entity.set("firstName", "Jimmy");
        assert_eq!(
            entity.pristine().unwrap().get("firstName"),
            Some(&Value::from("James"))
        );
        assert!(entity.is_dirty());

        entity.set("firstName", "James");
        assert!(!entity.is_dirty());
        assert!(entity.pristine().unwrap().contains_key("firstName"));
    }

    #[test]
    fn new_field_then_null_is_clean() {
        let mut entity = saved("c1");
        entity.set("nickname", "JD");
        assert!(entity.is_dirty());
        entity.unset("nickname");
        assert!(!entity.is_dirty());
        entity.set("nickname", Value::Null);
        assert!(!entity.is_dirty());
    }

    #[test]
    fn arrays_compare_elementwise() {
        let mut entity = saved("c1");
        entity.set("tags", vec!["a", "b", "c"]);
        assert!(entity.is_dirty());
        entity.set("tags", vec!["a", "b"]);
        assert!(!entity.is_dirty());
    }

    #[test]
    fn dirty_marker_forces_dirty() {
        let mut entity = saved("c1");
        entity.set(DIRTY_MARKER, true);
        assert!(entity.is_dirty());
        assert!(entity.get(DIRTY_MARKER).is_none());

        entity.commit_revision("2-b".into());
        assert!(!entity.is_dirty());
        assert_eq!(entity.rev(), Some("2-b"));
    }

    #[test]
    fn reserved_names_are_not_writable() {
        let mut entity = saved("c1");
        entity.set("_id", "other");
        entity.set("DocumentType", "Other");
        entity.set(TRACKED_MARKER, false);
        assert_eq!(entity.id(), Some("c1"));
        assert_eq!(entity.document_type(), "Contacts");
        assert!(!entity.fields().contains_key("_id"));
        assert!(!entity.is_dirty());
    }

    #[test]
    fn tracked_marker_reads_through() {
        let mut entity = saved("c1");
        assert_eq!(entity.get(TRACKED_MARKER), None);
        entity.set_tracked(true);
        assert_eq!(entity.get(TRACKED_MARKER), Some(&Value::Bool(true)));
    }

    #[test]
    fn untracked_writes_skip_snapshot() {
        let mut entity = saved("c1");
        entity.put_untracked("referencePath", Value::from("docset://x/_id:1"));
        assert!(!entity.is_dirty());
        assert!(entity.pristine().is_none());
    }

    #[test]
    fn document_projection() {
        let entity = saved("c1");
        let doc = entity.to_document();
        assert_eq!(doc.id, "c1");
        assert_eq!(doc.rev.as_deref(), Some("1-a"));
        assert_eq!(doc.document_type, "Contacts");
        assert!(!doc.deleted);
        assert_eq!(doc.fields.len(), 2);
    }

    proptest! {
        #[test]
        fn toggling_back_is_clean(original in any::<i64>(), changed in any::<i64>()) {
            let mut entity = Entity::from_document(
                Document::new("e", "T").with_rev("1-a").with_field("n", original),
            );
            entity.set("n", changed);
            prop_assert_eq!(entity.is_dirty(), original != changed);
            entity.set("n", original);
            prop_assert!(!entity.is_dirty());
        }

        #[test]
        fn baseline_is_pre_first_mutation(
            original in "[a-z]{0,8}",
            writes in prop::collection::vec("[a-z]{0,8}", 1..6),
        ) {
            let mut entity = Entity::from_document(
                Document::new("e", "T").with_rev("1-a").with_field("s", original.as_str()),
            );
            for w in &writes {
                entity.set("s", w.as_str());
            }
            let baseline = entity.pristine().and_then(|p| p.get("s")).cloned();
            prop_assert_eq!(baseline, Some(Value::from(original.as_str())));
        }
    }
}
