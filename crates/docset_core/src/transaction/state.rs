//! Pending change lists of a save cycle.

use crate::entity::EntityRef;
use std::collections::HashSet;

/// An id marked for removal without a loaded entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingRemoval {
    pub id: String,
    pub document_type: String,
}

/// The `add`, `remove` and `remove_by_id` lists.
#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
    pub add: Vec<EntityRef>,
    pub remove: Vec<EntityRef>,
    pub remove_by_id: Vec<PendingRemoval>,
}

impl PendingChanges {
    /// Returns true if `id` is already in `remove` or `remove_by_id`.
    pub fn is_marked_for_removal(&self, id: &str) -> bool {
        self.remove_by_id.iter().any(|r| r.id == id)
            || self.remove.iter().any(|e| e.read().id() == Some(id))
    }

    /// Returns every id in `remove` and `remove_by_id`.
    pub fn removal_ids(&self) -> HashSet<String> {
        self.remove
            .iter()
            .filter_map(EntityRef::id)
            .chain(self.remove_by_id.iter().map(|r| r.id.clone()))
            .collect()
    }

    /// Drops an unsaved add, returning true if it was pending.
    pub fn withdraw_add(&mut self, entity: &EntityRef) -> bool {
        let before = self.add.len();
        self.add.retain(|pending| !pending.ptr_eq(entity));
        self.add.len() != before
    }

    /// Drops every entry that was written, keeping rejected ones for retry.
    pub fn settle(&mut self, added: &[EntityRef], removed_ids: &[String]) {
        self.add
            .retain(|pending| !added.iter().any(|saved| saved.ptr_eq(pending)));
        self.remove.retain(|pending| {
            pending
                .read()
                .id()
                .is_some_and(|id| !removed_ids.iter().any(|r| r == id))
        });
        self.remove_by_id
            .retain(|pending| !removed_ids.contains(&pending.id));
    }
}

/// Sizes of the pending change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    /// Entities awaiting their first write.
    pub added: usize,
    /// Entities and ids marked for removal.
    pub removed: usize,
    /// Tracked entities with unsaved changes.
    pub updated: usize,
}

impl PendingCounts {
    /// Returns the total number of pending writes.
    pub fn total(&self) -> usize {
        self.added + self.removed + self.updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    fn handle(id: &str) -> EntityRef {
        EntityRef::new(Entity::with_id("Contacts", id))
    }

    #[test]
    fn removal_marks_cover_both_lists() {
        let mut pending = PendingChanges::default();
        pending.remove.push(handle("a"));
        pending.remove_by_id.push(PendingRemoval {
            id: "b".into(),
            document_type: "Contacts".into(),
        });
        assert!(pending.is_marked_for_removal("a"));
        assert!(pending.is_marked_for_removal("b"));
        assert!(!pending.is_marked_for_removal("c"));
        assert_eq!(
            pending.removal_ids(),
            HashSet::from(["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn settle_keeps_rejected_entries() {
        let mut pending = PendingChanges::default();
        let saved = handle("new1");
        let rejected = handle("new2");
        pending.add.extend([saved.clone(), rejected.clone()]);
        pending.remove.extend([handle("a"), handle("b")]);
        pending.remove_by_id.push(PendingRemoval {
            id: "c".into(),
            document_type: "Contacts".into(),
        });

        pending.settle(&[saved], &["a".to_string(), "c".to_string()]);

        assert_eq!(pending.add.len(), 1);
        assert!(pending.add[0].ptr_eq(&rejected));
        assert_eq!(pending.remove.len(), 1);
        assert_eq!(pending.remove[0].id().as_deref(), Some("b"));
        assert!(pending.remove_by_id.is_empty());
    }

    #[test]
    fn withdraw_add_by_identity() {
        let mut pending = PendingChanges::default();
        let a = handle("a");
        pending.add.push(a.clone());
        assert!(!pending.withdraw_add(&handle("a")));
        assert!(pending.withdraw_add(&a));
        assert!(pending.add.is_empty());
    }
}
