//! Identity map of tracked entities.

use super::handle::EntityRef;
use super::tracked::Entity;
use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;

/// Entities under observation, keyed by id.
///
/// Iteration follows id order, so scans are deterministic. Inserting an id
/// that is already present replaces the previous handle.
#[derive(Debug, Default)]
pub struct AttachmentRegistry {
    entries: BTreeMap<String, EntityRef>,
}

impl AttachmentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the entity has no id.
    pub fn insert(&mut self, entity: EntityRef) -> CoreResult<()> {
        let id = {
            let mut guard = entity.write();
            let id = guard
                .id()
                .map(str::to_owned)
                .ok_or_else(|| CoreError::validation("cannot track an entity without an id"))?;
            guard.set_tracked(true);
            id
        };
        if let Some(previous) = self.entries.insert(id, entity.clone()) {
            if !previous.ptr_eq(&entity) {
                previous.write().set_tracked(false);
            }
        }
        Ok(())
    }

    /// Starts tracking every entity.
    ///
    /// # Errors
    ///
    /// Returns a validation error at the first entity without an id; the
    /// entities before it stay inserted.
    pub fn insert_all(&mut self, entities: impl IntoIterator<Item = EntityRef>) -> CoreResult<()> {
        for entity in entities {
            self.insert(entity)?;
        }
        Ok(())
    }

    /// Stops tracking an id, returning its handle.
    pub fn remove(&mut self, id: &str) -> Option<EntityRef> {
        let removed = self.entries.remove(id)?;
        removed.write().set_tracked(false);
        Some(removed)
    }

    /// Stops tracking every listed id.
    pub fn remove_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        for id in ids {
            self.remove(id);
        }
    }

    /// Returns the handle tracked under `id`.
    pub fn get(&self, id: &str) -> Option<&EntityRef> {
        self.entries.get(id)
    }

    /// Returns true if `id` is tracked.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Returns every tracked entity satisfying the predicate.
    pub fn filter(&self, predicate: impl Fn(&Entity) -> bool) -> Vec<EntityRef> {
        self.entries
            .values()
            .filter(|entity| predicate(&entity.read()))
            .cloned()
            .collect()
    }

    /// Iterates over tracked handles in id order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRef> {
        self.entries.values()
    }

    /// Returns the number of tracked entities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stops tracking everything.
    pub fn clear(&mut self) {
        for entity in self.entries.values() {
            entity.write().set_tracked(false);
        }
        self.entries.clear();
    }
}
