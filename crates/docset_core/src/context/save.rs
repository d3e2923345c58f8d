//! Reconciliation of tracked changes into one bulk write.

use super::{DataContext, TrackingState};
use crate::entity::{Entity, EntityRef};
use crate::error::CoreResult;
use crate::transaction::PendingRemoval;
use docset_codec::Document;
use docset_store::{DocumentStore, StoreProvider, WriteResult};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Removed,
    Added,
    Updated,
}

#[derive(Debug)]
struct BatchEntry {
    kind: ChangeKind,
    entity: EntityRef,
    doc: Document,
}

/// Entities whose writes succeeded in one save.
#[derive(Debug, Default)]
pub(crate) struct SaveOutcome {
    pub removed: Vec<EntityRef>,
    pub added: Vec<EntityRef>,
    pub updated: Vec<EntityRef>,
    pub removed_ids: Vec<String>,
    pub rejected: usize,
}

impl SaveOutcome {
    pub fn written(&self) -> usize {
        self.removed.len() + self.added.len() + self.updated.len()
    }

    /// Returns true if the primary write of `entity` succeeded.
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.removed
            .iter()
            .chain(&self.added)
            .chain(&self.updated)
            .any(|written| written.ptr_eq(entity))
    }
}

struct ChangeSet {
    added: Vec<EntityRef>,
    removed: Vec<EntityRef>,
    removed_by_id: Vec<PendingRemoval>,
    updated: Vec<EntityRef>,
}

impl TrackingState {
    fn change_set(&self) -> ChangeSet {
        let removal_ids = self.pending.removal_ids();
        let updated = self.registry.filter(|entity| {
            entity.is_dirty() && entity.id().is_some_and(|id| !removal_ids.contains(id))
        });
        ChangeSet {
            added: self.pending.add.clone(),
            removed: self.pending.remove.clone(),
            removed_by_id: self.pending.remove_by_id.clone(),
            updated,
        }
    }

    fn settle(&mut self, outcome: &SaveOutcome) {
        self.pending.settle(&outcome.added, &outcome.removed_ids);
        self.registry
            .remove_all(outcome.removed_ids.iter().map(String::as_str));
        // written adds always carry an id
        if let Err(e) = self.registry.insert_all(outcome.added.iter().cloned()) {
            tracing::warn!(error = %e, "could not track saved entity");
        }
    }
}

impl<P: StoreProvider> DataContext<P> {
    /// Writes every pending change in one bulk write.
    ///
    /// The batch holds deletion stubs for removed entities and ids, then new
    /// entities, then tracked entities with unsaved changes. Written
    /// entities receive their new revisions and a clean tracking state;
    /// rejected ones stay pending for the next save. Split-document
    /// references are written to their secondary stores afterwards, then
    /// observers run and the tracking state resets. A secondary store
    /// that fails is logged and left catalogued; it never fails a save
    /// whose primary batch was written.
    ///
    /// Returns the number of primary documents written.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::NotFound`] if an id passed to
    /// `remove_by_id` does not exist, or a store error if a store rejects
    /// the whole batch. The pending change set is left as it was so the
    /// save can be retried.
    pub async fn save_changes(&self) -> CoreResult<usize> {
        let changes = self.state().change_set();
        let resolved = self.resolve_removals(&changes.removed_by_id).await?;
        let removed: Vec<EntityRef> = changes.removed.into_iter().chain(resolved).collect();
        let added = changes.added;
        let updated = changes.updated;

        if removed.is_empty() && added.is_empty() && updated.is_empty() {
            self.transactions().clear();
            tracing::debug!("no pending changes");
            return Ok(0);
        }

        let plan = if self.has_split_dbsets() {
            Some(self.prepare_split(&removed, &added, &updated).await?)
        } else {
            None
        };

        tracing::debug!(
            removals = removed.len(),
            additions = added.len(),
            updates = updated.len(),
            "writing batch"
        );
        let batch = self.build_batch(removed, added, updated);
        let docs: Vec<Document> = batch.iter().map(|entry| entry.doc.clone()).collect();
        let results = self.store().bulk_write(docs).await?;
        if results.len() != batch.len() {
            tracing::warn!(
                expected = batch.len(),
                received = results.len(),
                "store returned a short result list"
            );
        }
        let outcome = apply_results(batch, results);

        if let Some(plan) = plan {
            self.finish_split(plan, &outcome).await;
        }

        self.notify(&outcome);
        self.state().settle(&outcome);
        self.transactions().clear();

        tracing::info!(
            written = outcome.written(),
            removed = outcome.removed.len(),
            added = outcome.added.len(),
            updated = outcome.updated.len(),
            rejected = outcome.rejected,
            "saved changes"
        );

        if self.config().cleanup_after_save {
            self.cleanup_orphans().await;
        }
        Ok(outcome.written())
    }

    /// Loads every id marked by `remove_by_id`, failing if any is missing.
    async fn resolve_removals(&self, pending: &[PendingRemoval]) -> CoreResult<Vec<EntityRef>> {
        let mut by_type: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for removal in pending {
            by_type
                .entry(removal.document_type.as_str())
                .or_default()
                .push(removal.id.clone());
        }

        let mut resolved = Vec::with_capacity(pending.len());
        for (document_type, ids) in by_type {
            let docs = self.fetch_strict(&ids, document_type).await?;
            let state = self.state();
            for doc in docs {
                let entity = match state.registry.get(&doc.id) {
                    Some(tracked) => tracked.clone(),
                    None => EntityRef::new(Entity::from_document(doc)),
                };
                resolved.push(entity);
            }
        }
        Ok(resolved)
    }

    fn build_batch(
        &self,
        removed: Vec<EntityRef>,
        added: Vec<EntityRef>,
        updated: Vec<EntityRef>,
    ) -> Vec<BatchEntry> {
        let mut batch = Vec::with_capacity(removed.len() + added.len() + updated.len());
        for entity in removed {
            let doc = entity.read().to_document().to_deletion_stub();
            batch.push(BatchEntry {
                kind: ChangeKind::Removed,
                entity,
                doc,
            });
        }
        for (kind, entities) in [(ChangeKind::Added, added), (ChangeKind::Updated, updated)] {
            for entity in entities {
                let doc = self.wire_document(&entity.read());
                batch.push(BatchEntry { kind, entity, doc });
            }
        }
        batch
    }

    fn notify(&self, outcome: &SaveOutcome) {
        let observers = self.observers.read().clone();
        if observers.is_empty() {
            return;
        }
        if !outcome.removed.is_empty() {
            for observer in &observers {
                observer.on_removed(&outcome.removed);
            }
        }
        if !outcome.added.is_empty() {
            for observer in &observers {
                observer.on_added(&outcome.added);
            }
        }
        if !outcome.updated.is_empty() {
            for observer in &observers {
                observer.on_updated(&outcome.updated);
            }
        }
    }
}

fn apply_results(batch: Vec<BatchEntry>, results: Vec<WriteResult>) -> SaveOutcome {
    let mut outcome = SaveOutcome::default();
    for (entry, result) in batch.into_iter().zip(results) {
        match result {
            WriteResult::Written { rev, .. } => {
                entry.entity.write().commit_revision(rev);
                match entry.kind {
                    ChangeKind::Removed => {
                        entry.entity.write().set_tracked(false);
                        outcome.removed_ids.push(entry.doc.id);
                        outcome.removed.push(entry.entity);
                    }
                    ChangeKind::Added => outcome.added.push(entry.entity),
                    ChangeKind::Updated => outcome.updated.push(entry.entity),
                }
            }
            WriteResult::Rejected { id, reason } => {
                tracing::warn!(%id, %reason, kind = ?entry.kind, "write rejected; change stays pending");
                outcome.rejected += 1;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::DbSetConfig;
    use crate::config::ContextConfig;
    use crate::error::CoreError;
    use crate::key::KeyStrategy;
    use crate::observer::SaveObserver;
    use docset_codec::Value;
    use docset_store::{MemoryServer, Selector};
    use parking_lot::Mutex;
    use std::sync::Arc;

    async fn contacts() -> DataContext<MemoryServer> {
        let dbset = DbSetConfig::new("Contacts")
            .key(KeyStrategy::composite_fields(["firstName", "lastName"]));
        DataContext::open(MemoryServer::new(), "app", ContextConfig::default(), [dbset])
            .await
            .unwrap()
    }

    fn person(ctx: &DataContext<MemoryServer>, first: &str, last: &str) -> EntityRef {
        let set = ctx.dbset("Contacts").unwrap();
        set.add(
            set.create()
                .with_field("firstName", first)
                .with_field("lastName", last),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_save_is_zero() {
        let ctx = contacts().await;
        assert_eq!(ctx.save_changes().await.unwrap(), 0);
        assert!(!ctx.has_pending_changes());
    }

    #[tokio::test]
    async fn add_then_update_then_toggle_back() {
        let ctx = contacts().await;
        let james = person(&ctx, "James", "DeMeuse");
        assert_eq!(james.id().as_deref(), Some("Contacts/James/DeMeuse"));
        assert!(james.rev().is_none());

        assert_eq!(ctx.save_changes().await.unwrap(), 1);
        let first_rev = james.rev().unwrap();
        assert!(ctx.is_tracked("Contacts/James/DeMeuse"));
        assert!(!ctx.has_pending_changes());

        james.set("age", 41i64);
        assert_eq!(ctx.pending_counts().updated, 1);
        assert_eq!(ctx.save_changes().await.unwrap(), 1);
        assert_ne!(james.rev().unwrap(), first_rev);

        james.set("age", 42i64);
        james.set("age", 41i64);
        assert_eq!(ctx.save_changes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn removals_precede_additions_in_the_batch() {
        let ctx = contacts().await;
        let old = person(&ctx, "Ann", "Lee");
        ctx.save_changes().await.unwrap();

        let set = ctx.dbset("Contacts").unwrap();
        set.remove(&old).unwrap();
        let replacement = person(&ctx, "Ann", "Lee");
        replacement.set("note", "second");

        let changes = ctx.state().change_set();
        let batch = ctx.build_batch(changes.removed, changes.added, changes.updated);
        let kinds: Vec<_> = batch.iter().map(|e| (e.kind, e.doc.deleted)).collect();
        assert_eq!(
            kinds,
            vec![(ChangeKind::Removed, true), (ChangeKind::Added, false)]
        );
        assert_eq!(batch[0].doc.id, batch[1].doc.id);

        assert_eq!(ctx.save_changes().await.unwrap(), 2);
        assert!(ctx
            .state()
            .registry
            .get("Contacts/Ann/Lee")
            .unwrap()
            .ptr_eq(&replacement));
        let stored = set.find(Selector::eq("firstName", "Ann")).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get("note"), Some(Value::from("second")));
    }

    #[tokio::test]
    async fn rejected_writes_stay_pending() {
        let ctx = contacts().await;
        let ann = person(&ctx, "Ann", "Lee");
        ctx.save_changes().await.unwrap();

        // a concurrent writer bumps the revision behind our back
        let mut stale = ann.read().to_document();
        stale.fields.insert("age".into(), 1i64.into());
        let results = ctx.store().bulk_write(vec![stale]).await.unwrap();
        assert!(results[0].is_ok());

        ann.set("age", 2i64);
        let duplicate = person(&ctx, "Ann", "Lee");
        assert_eq!(ctx.save_changes().await.unwrap(), 0);
        assert!(ann.is_dirty());
        assert!(duplicate.rev().is_none());
        assert_eq!(ctx.pending_counts().added, 1);
        assert_eq!(ctx.pending_counts().updated, 1);
    }

    #[tokio::test]
    async fn remove_by_id_missing_keeps_state() {
        let ctx = contacts().await;
        let set = ctx.dbset("Contacts").unwrap();
        set.remove_by_id("Contacts/No/Body").unwrap();
        person(&ctx, "Ann", "Lee");

        let err = ctx.save_changes().await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { ref ids } if ids == &["Contacts/No/Body"]));
        assert!(ctx.has_pending_changes());
        assert_eq!(ctx.pending_counts().removed, 1);
        assert_eq!(ctx.pending_counts().added, 1);
        assert_eq!(ctx.store().doc_count().await.unwrap(), 0);
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(&'static str, usize)>>);

    impl SaveObserver for Recorder {
        fn on_removed(&self, entities: &[EntityRef]) {
            self.0.lock().push(("removed", entities.len()));
        }
        fn on_added(&self, entities: &[EntityRef]) {
            self.0.lock().push(("added", entities.len()));
        }
        fn on_updated(&self, entities: &[EntityRef]) {
            self.0.lock().push(("updated", entities.len()));
        }
    }

    #[tokio::test]
    async fn observers_run_removed_added_updated() {
        let ctx = contacts().await;
        let a = person(&ctx, "A", "A");
        let b = person(&ctx, "B", "B");
        ctx.save_changes().await.unwrap();

        let recorder = Arc::new(Recorder::default());
        ctx.add_observer(recorder.clone());

        a.set("x", 1i64);
        person(&ctx, "C", "C");
        ctx.dbset("Contacts").unwrap().remove(&b).unwrap();
        assert_eq!(ctx.save_changes().await.unwrap(), 3);
        assert_eq!(
            *recorder.0.lock(),
            vec![("removed", 1), ("added", 1), ("updated", 1)]
        );

        a.set("x", 2i64);
        ctx.save_changes().await.unwrap();
        assert_eq!(recorder.0.lock().last(), Some(&("updated", 1)));
        assert_eq!(recorder.0.lock().len(), 4);
    }
}
