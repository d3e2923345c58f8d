//! Save lifecycle callbacks.

use crate::entity::EntityRef;

/// Receives the outcome of each save.
///
/// Callbacks run after the store write and before tracking state resets,
/// in the order removed, added, updated. A callback only runs when its set
/// is non-empty. Entities in each slice carry their new revisions.
pub trait SaveObserver: Send + Sync {
    /// Entities whose deletion was written.
    fn on_removed(&self, _entities: &[EntityRef]) {}

    /// Entities written for the first time.
    fn on_added(&self, _entities: &[EntityRef]) {}

    /// Tracked entities whose changes were written.
    fn on_updated(&self, _entities: &[EntityRef]) {}
}
