//! Shared entity handles.

use super::tracked::Entity;
use docset_codec::Value;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// A shared, mutable handle to an entity.
///
/// The data context and the caller hold clones of the same handle, so
/// writes made through any clone are seen by the next save. Cloning a
/// handle never copies the entity.
#[derive(Clone)]
pub struct EntityRef(Arc<RwLock<Entity>>);

impl EntityRef {
    pub(crate) fn new(entity: Entity) -> Self {
        Self(Arc::new(RwLock::new(entity)))
    }

    /// Locks the entity for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Entity> {
        self.0.read()
    }

    /// Locks the entity for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Entity> {
        self.0.write()
    }

    /// Returns the entity id.
    pub fn id(&self) -> Option<String> {
        self.read().id().map(str::to_owned)
    }

    /// Returns the current revision.
    pub fn rev(&self) -> Option<String> {
        self.read().rev().map(str::to_owned)
    }

    /// Returns the document type.
    pub fn document_type(&self) -> String {
        self.read().document_type().to_owned()
    }

    /// Returns a copy of a field.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.read().get(name).cloned()
    }

    /// Writes a field. See [`Entity::set`].
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.write().set(name, value);
    }

    /// Returns true if the entity has unsaved field changes.
    pub fn is_dirty(&self) -> bool {
        self.read().is_dirty()
    }

    /// Returns a detached copy of the entity.
    pub fn snapshot(&self) -> Entity {
        self.read().clone()
    }

    /// Returns true if both handles point at the same entity.
    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&*self.read()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let a = EntityRef::new(Entity::with_id("Contacts", "c1"));
        let b = a.clone();
        b.set("firstName", "James");
        assert_eq!(a.get("firstName"), Some(Value::from("James")));
        assert!(a.ptr_eq(&b));
        assert!(a.is_dirty());
    }

    #[test]
    fn snapshot_is_detached() {
        let a = EntityRef::new(Entity::with_id("Contacts", "c1"));
        let copy = a.snapshot();
        a.set("x", 1i64);
        assert!(copy.get("x").is_none());
        assert!(!a.ptr_eq(&EntityRef::new(copy)));
    }
}
