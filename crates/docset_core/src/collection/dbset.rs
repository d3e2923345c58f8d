//! The dbset handle: adds, removals, reads and attachment for one document type.

use super::config::{DbSetDefinition, SplitConfig};
use crate::context::DataContext;
use crate::entity::{Entity, EntityRef, DIRTY_MARKER};
use crate::error::{CoreError, CoreResult};
use crate::transaction::PendingRemoval;
use docset_codec::{Document, DOCUMENT_TYPE_FIELD};
use docset_store::{FindRequest, Selector, StoreProvider};

/// All entities of one document type within a [`DataContext`].
///
/// Reads return tracked handles: mutate them and call
/// [`DataContext::save_changes`] to persist. An id that is already tracked
/// always comes back as the same handle.
pub struct DbSet<'a, P: StoreProvider> {
    context: &'a DataContext<P>,
    definition: &'a DbSetDefinition,
}

impl<'a, P: StoreProvider> DbSet<'a, P> {
    pub(crate) fn new(context: &'a DataContext<P>, definition: &'a DbSetDefinition) -> Self {
        Self {
            context,
            definition,
        }
    }

    /// Returns the document type.
    pub fn document_type(&self) -> &str {
        self.definition.document_type()
    }

    /// Returns the split configuration, if the set holds split documents.
    pub fn split(&self) -> Option<&SplitConfig> {
        self.definition.split()
    }

    /// Creates an empty draft of this set's document type.
    pub fn create(&self) -> Entity {
        Entity::new(self.document_type())
    }

    /// Returns true if `entity` belongs to this set.
    pub fn is_match(&self, entity: &EntityRef) -> bool {
        entity.read().document_type() == self.document_type()
    }

    /// Queues a new entity for its first write.
    ///
    /// An entity without an id gets one from the set's key strategy. Split
    /// entities are validated and receive their locator here.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the entity already has a revision or
    /// belongs to another document type, a selector's error if key
    /// derivation fails, and [`CoreError::ReservedReferenceFields`] for a
    /// managed reference carrying `_id`, `_rev` or `DocumentType`.
    pub fn add(&self, mut entity: Entity) -> CoreResult<EntityRef> {
        if entity.rev().is_some() {
            return Err(CoreError::validation(format!(
                "entity {} is already persisted; attach it instead",
                entity.id().unwrap_or_default()
            )));
        }
        if entity.document_type().is_empty() {
            entity.set_document_type(self.document_type());
        } else if entity.document_type() != self.document_type() {
            return Err(CoreError::validation(format!(
                "cannot add a {} entity to the {} set",
                entity.document_type(),
                self.document_type()
            )));
        }
        if entity.id().is_none() {
            let id = self
                .definition
                .config
                .key
                .derive(self.document_type(), &entity)?;
            entity.assign_id(id);
        }
        if let Some(split) = self.split() {
            self.context.prepare_split_add(split, &mut entity)?;
        }

        tracing::debug!(document_type = self.document_type(), id = ?entity.id(), "queued add");
        let handle = EntityRef::new(entity);
        self.context.state().pending.add.push(handle.clone());
        Ok(handle)
    }

    /// Queues several new entities.
    ///
    /// # Errors
    ///
    /// Stops at the first entity [`DbSet::add`] rejects; earlier entities
    /// stay queued.
    pub fn add_range(&self, entities: impl IntoIterator<Item = Entity>) -> CoreResult<Vec<EntityRef>> {
        entities.into_iter().map(|entity| self.add(entity)).collect()
    }

    /// Marks an entity for deletion.
    ///
    /// Removing an entity that was added but never saved just drops the
    /// pending add.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the entity has no id, belongs to
    /// another set, or has no revision and is not a pending add, and
    /// [`CoreError::DuplicateRemoval`] if its id is already marked.
    pub fn remove(&self, entity: &EntityRef) -> CoreResult<()> {
        let (id, persisted) = {
            let guard = entity.read();
            if guard.document_type() != self.document_type() {
                return Err(CoreError::validation(format!(
                    "cannot remove a {} entity from the {} set",
                    guard.document_type(),
                    self.document_type()
                )));
            }
            let id = guard
                .id()
                .map(str::to_owned)
                .ok_or_else(|| CoreError::validation("cannot remove an entity without an id"))?;
            (id, guard.rev().is_some())
        };

        {
            let mut state = self.context.state();
            if !persisted {
                if state.pending.withdraw_add(entity) {
                    tracing::debug!(%id, "dropped unsaved add");
                } else {
                    return Err(CoreError::validation(format!(
                        "entity {id} was never saved"
                    )));
                }
            } else if state.pending.is_marked_for_removal(&id) {
                return Err(CoreError::DuplicateRemoval { id });
            } else {
                state.pending.remove.push(entity.clone());
            }
        }
        self.end_split_transaction();
        Ok(())
    }

    /// Marks several entities for deletion.
    ///
    /// # Errors
    ///
    /// Stops at the first entity [`DbSet::remove`] rejects.
    pub fn remove_range(&self, entities: &[EntityRef]) -> CoreResult<()> {
        entities.iter().try_for_each(|entity| self.remove(entity))
    }

    /// Marks an id for deletion without loading it.
    ///
    /// The id is resolved with a strict fetch when the context saves, so a
    /// missing id fails the save.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateRemoval`] if the id is already marked.
    pub fn remove_by_id(&self, id: &str) -> CoreResult<()> {
        {
            let mut state = self.context.state();
            if state.pending.is_marked_for_removal(id) {
                return Err(CoreError::DuplicateRemoval { id: id.to_string() });
            }
            state.pending.remove_by_id.push(PendingRemoval {
                id: id.to_string(),
                document_type: self.document_type().to_string(),
            });
        }
        self.end_split_transaction();
        Ok(())
    }

    /// Marks every stored entity of the set for deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the set cannot be read.
    pub async fn empty(&self) -> CoreResult<()> {
        let entities = self.all().await?;
        let marked = self.context.state().pending.removal_ids();
        let unmarked: Vec<EntityRef> = entities
            .into_iter()
            .filter(|entity| entity.id().is_some_and(|id| !marked.contains(&id)))
            .collect();
        self.remove_range(&unmarked)
    }

    /// Returns every stored entity of the set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or rejects the query.
    pub async fn all(&self) -> CoreResult<Vec<EntityRef>> {
        self.query(Selector::All, None).await
    }

    /// Returns the stored entities matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or rejects the query.
    pub async fn find(&self, selector: Selector) -> CoreResult<Vec<EntityRef>> {
        self.query(selector, None).await
    }

    /// Returns the first stored entity matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or rejects the query.
    pub async fn first(&self, selector: Selector) -> CoreResult<Option<EntityRef>> {
        Ok(self.query(selector, Some(1)).await?.into_iter().next())
    }

    /// Returns the stored entities with the given ids, skipping missing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    pub async fn get(&self, ids: &[String]) -> CoreResult<Vec<EntityRef>> {
        // bulk get takes no index hint, but the read still spends a one-shot override
        self.definition.index.get();
        let docs = self
            .context
            .get_documents(ids)
            .await?
            .into_iter()
            .filter(|doc| doc.document_type == self.document_type())
            .collect();
        self.materialize(docs).await
    }

    /// Loads and tracks the entities with the given ids; every id must exist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] listing every missing id.
    pub async fn link(&self, ids: &[String]) -> CoreResult<Vec<EntityRef>> {
        self.definition.index.get();
        let docs = self.context.fetch_strict(ids, self.document_type()).await?;
        self.materialize(docs).await
    }

    /// Starts tracking persisted entities obtained elsewhere.
    ///
    /// # Errors
    ///
    /// Returns a validation error if an entity lacks an id, revision or
    /// document type, or belongs to another set.
    pub fn attach(&self, entities: &[EntityRef]) -> CoreResult<()> {
        for entity in entities {
            self.ensure_persisted(entity, "attach")?;
        }
        self.context
            .state()
            .registry
            .insert_all(entities.iter().cloned())
    }

    /// Stops tracking entities; their changes are no longer saved.
    ///
    /// # Errors
    ///
    /// Returns a validation error if an entity lacks an id, revision or
    /// document type, or belongs to another set.
    pub fn detach(&self, entities: &[EntityRef]) -> CoreResult<()> {
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            ids.push(self.ensure_persisted(entity, "detach")?);
        }
        self.context
            .state()
            .registry
            .remove_all(ids.iter().map(String::as_str));
        Ok(())
    }

    /// Forces a tracked entity into the next save.
    pub fn mark_dirty(&self, entity: &EntityRef) {
        entity.write().set(DIRTY_MARKER, true);
    }

    /// Uses `name` as the index hint of the next read only.
    pub fn use_index(&self, name: impl Into<String>) -> &Self {
        self.definition.index.use_index(name);
        self
    }

    async fn query(&self, selector: Selector, limit: Option<usize>) -> CoreResult<Vec<EntityRef>> {
        let selector = Selector::eq(DOCUMENT_TYPE_FIELD, self.document_type()).and(selector);
        let mut request = FindRequest::new(selector).with_index(self.definition.index.get());
        if let Some(limit) = limit {
            request = request.with_limit(limit);
        }
        let docs = self.context.find_documents(request).await?;
        self.materialize(docs).await
    }

    async fn materialize(&self, mut docs: Vec<Document>) -> CoreResult<Vec<EntityRef>> {
        if let Some(split) = self.split() {
            self.context.splice_references(split, &mut docs).await;
        }
        self.context.track_documents(docs)
    }

    fn ensure_persisted(&self, entity: &EntityRef, action: &str) -> CoreResult<String> {
        let guard = entity.read();
        let (Some(id), Some(_)) = (guard.id(), guard.rev()) else {
            return Err(CoreError::validation(format!(
                "cannot {action} an entity without an id and revision"
            )));
        };
        if guard.document_type().is_empty() {
            return Err(CoreError::validation(format!(
                "cannot {action} entity {id} without a document type"
            )));
        }
        if guard.document_type() != self.document_type() {
            return Err(CoreError::validation(format!(
                "cannot {action} a {} entity through the {} set",
                guard.document_type(),
                self.document_type()
            )));
        }
        Ok(id.to_string())
    }

    fn end_split_transaction(&self) {
        if self.split().is_some_and(SplitConfig::is_managed) {
            self.context.transactions().end(self.document_type());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::DbSetConfig;
    use crate::config::ContextConfig;
    use crate::entity::TRACKED_MARKER;
    use crate::key::KeyStrategy;
    use docset_codec::Value;
    use docset_store::{DocumentStore, MemoryServer};

    async fn context() -> DataContext<MemoryServer> {
        let contacts = DbSetConfig::new("Contacts")
            .key(KeyStrategy::composite_fields(["firstName", "lastName"]));
        let books = DbSetConfig::new("Books").default_index("by-title");
        DataContext::open(MemoryServer::new(), "app", ContextConfig::default(), [contacts, books])
            .await
            .unwrap()
    }

    fn draft(first: &str, last: &str) -> Entity {
        Entity::new("Contacts")
            .with_field("firstName", first)
            .with_field("lastName", last)
    }

    #[tokio::test]
    async fn add_validates() {
        let ctx = context().await;
        let contacts = ctx.dbset("Contacts").unwrap();

        let persisted = Entity::from_document(Document::new("x", "Contacts").with_rev("1-a"));
        assert!(contacts.add(persisted).unwrap_err().is_validation());
        assert!(contacts.add(Entity::new("Books")).unwrap_err().is_validation());

        let untyped = contacts.add(Entity::default().with_field("firstName", "A")).unwrap();
        assert_eq!(untyped.document_type(), "Contacts");
        assert_eq!(untyped.id().as_deref(), Some("Contacts/A/"));

        let explicit = contacts.add(Entity::with_id("Contacts", "custom")).unwrap();
        assert_eq!(explicit.id().as_deref(), Some("custom"));
        assert_eq!(ctx.pending_counts().added, 2);
    }

    #[tokio::test]
    async fn double_removal_is_rejected() {
        let ctx = context().await;
        let contacts = ctx.dbset("Contacts").unwrap();
        let ann = contacts.add(draft("Ann", "Lee")).unwrap();
        ctx.save_changes().await.unwrap();

        contacts.remove(&ann).unwrap();
        assert!(matches!(
            contacts.remove(&ann),
            Err(CoreError::DuplicateRemoval { id }) if id == "Contacts/Ann/Lee"
        ));
        assert!(matches!(
            contacts.remove_by_id("Contacts/Ann/Lee"),
            Err(CoreError::DuplicateRemoval { .. })
        ));

        contacts.remove_by_id("other").unwrap();
        assert!(contacts.remove_by_id("other").is_err());
        assert_eq!(ctx.pending_counts().removed, 2);
    }

    #[tokio::test]
    async fn removing_an_unsaved_add_drops_it() {
        let ctx = context().await;
        let contacts = ctx.dbset("Contacts").unwrap();
        let ann = contacts.add(draft("Ann", "Lee")).unwrap();
        contacts.remove(&ann).unwrap();
        assert!(!ctx.has_pending_changes());
        assert!(contacts.remove(&ann).unwrap_err().is_validation());
        assert_eq!(ctx.save_changes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reads_track_and_reuse_handles() {
        let ctx = context().await;
        let contacts = ctx.dbset("Contacts").unwrap();
        contacts
            .add_range([draft("Ann", "Lee"), draft("Bob", "Ray")])
            .unwrap();
        ctx.save_changes().await.unwrap();

        let all = contacts.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|e| e.get(TRACKED_MARKER) == Some(Value::Bool(true))));

        let bob = contacts
            .first(Selector::eq("firstName", "Bob"))
            .await
            .unwrap()
            .unwrap();
        assert!(all.iter().any(|e| e.ptr_eq(&bob)));

        bob.set("age", 30i64);
        let again = contacts.get(&["Contacts/Bob/Ray".to_string()]).await.unwrap();
        assert_eq!(again[0].get("age"), Some(Value::Integer(30)));
        assert!(contacts.first(Selector::eq("firstName", "Zed")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reads_are_scoped_to_the_document_type() {
        let ctx = context().await;
        ctx.create_index(["title"], "by-title").await.unwrap();
        ctx.store()
            .bulk_write(vec![
                Document::new("b1", "Books").with_field("title", "Dune"),
                Document::new("c1", "Contacts").with_field("title", "Dune"),
            ])
            .await
            .unwrap();

        let books = ctx.dbset("Books").unwrap();
        let found = books.find(Selector::eq("title", "Dune")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id().as_deref(), Some("b1"));

        let ids = ["b1".to_string(), "c1".to_string(), "zz".to_string()];
        assert_eq!(books.get(&ids).await.unwrap().len(), 1);
        assert!(matches!(
            books.link(&ids).await,
            Err(CoreError::NotFound { ids }) if ids == ["c1", "zz"]
        ));
    }

    #[tokio::test]
    async fn one_shot_index_override() {
        let ctx = context().await;
        ctx.create_index(["title"], "by-title").await.unwrap();
        let books = ctx.dbset("Books").unwrap();

        assert!(books.all().await.is_ok());
        assert!(books.use_index("missing").all().await.is_err());
        assert!(books.all().await.is_ok());
    }

    #[tokio::test]
    async fn attach_and_detach() {
        let ctx = context().await;
        let contacts = ctx.dbset("Contacts").unwrap();

        let draft = EntityRef::new(Entity::with_id("Contacts", "x"));
        assert!(contacts.attach(&[draft]).unwrap_err().is_validation());

        let loaded = EntityRef::new(Entity::from_document(
            Document::new("Contacts/Ann/Lee", "Contacts").with_rev("1-a"),
        ));
        let foreign = EntityRef::new(Entity::from_document(
            Document::new("b1", "Books").with_rev("1-a"),
        ));
        assert!(contacts.attach(&[foreign]).unwrap_err().is_validation());

        contacts.attach(&[loaded.clone()]).unwrap();
        assert!(ctx.is_tracked("Contacts/Ann/Lee"));
        loaded.set("age", 1i64);
        assert_eq!(ctx.pending_counts().updated, 1);

        contacts.detach(&[loaded.clone()]).unwrap();
        assert!(!ctx.is_tracked("Contacts/Ann/Lee"));
        assert!(!ctx.has_pending_changes());
    }

    #[tokio::test]
    async fn mark_dirty_forces_a_write() {
        let ctx = context().await;
        let contacts = ctx.dbset("Contacts").unwrap();
        let ann = contacts.add(draft("Ann", "Lee")).unwrap();
        ctx.save_changes().await.unwrap();
        let rev = ann.rev();

        contacts.mark_dirty(&ann);
        assert_eq!(ctx.save_changes().await.unwrap(), 1);
        assert_ne!(ann.rev(), rev);
        assert!(!ann.is_dirty());
    }

    #[tokio::test]
    async fn empty_then_save_clears_the_set() {
        let ctx = context().await;
        let contacts = ctx.dbset("Contacts").unwrap();
        contacts
            .add_range((0..20).map(|i| draft("N", &i.to_string())))
            .unwrap();
        assert_eq!(ctx.save_changes().await.unwrap(), 20);

        let first = contacts.first(Selector::All).await.unwrap().unwrap();
        contacts.remove(&first).unwrap();
        contacts.empty().await.unwrap();
        assert_eq!(ctx.pending_counts().removed, 20);

        assert_eq!(ctx.save_changes().await.unwrap(), 20);
        assert!(contacts.all().await.unwrap().is_empty());
        assert_eq!(ctx.tracked_count(), 0);
    }
}
