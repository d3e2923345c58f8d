//! The data context: a unit of work over a primary document store.

mod cleanup;
mod save;
mod split;

pub use cleanup::CleanupReport;

use crate::catalog::DatabaseCatalog;
use crate::collection::{DbSet, DbSetConfig, DbSetDefinition, SplitMode};
use crate::config::ContextConfig;
use crate::entity::{AttachmentRegistry, Entity, EntityRef};
use crate::error::{CoreError, CoreResult};
use crate::observer::SaveObserver;
use crate::transaction::{CorrelationRecord, PendingChanges, PendingCounts, TransactionContext};
use docset_codec::{Document, Value};
use docset_store::{
    DocumentStore, FetchResult, FindRequest, IndexDefinition, StoreError, StoreProvider,
};
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Pending change lists plus the attachment registry.
#[derive(Debug, Default)]
pub(crate) struct TrackingState {
    pub pending: PendingChanges,
    pub registry: AttachmentRegistry,
}

/// Tracks entity changes against a primary store and reconciles them in
/// one bulk write per [`DataContext::save_changes`].
///
/// A context owns the primary store, one [`DbSet`] declaration per
/// document type, the attachment registry, the pending add/remove lists,
/// the split-document transaction context and the database catalog. All of
/// it is private to the context instance.
///
/// # Example
///
/// ```rust
/// use docset_core::{ContextConfig, DataContext, DbSetConfig, KeyStrategy};
/// use docset_store::MemoryServer;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let contacts = DbSetConfig::new("Contacts")
///     .key(KeyStrategy::composite_fields(["firstName", "lastName"]));
/// let ctx = DataContext::open(MemoryServer::new(), "app", ContextConfig::default(), [contacts])
///     .await
///     .unwrap();
///
/// let set = ctx.dbset("Contacts").unwrap();
/// let james = set
///     .add(set.create().with_field("firstName", "James").with_field("lastName", "DeMeuse"))
///     .unwrap();
/// assert_eq!(james.id().as_deref(), Some("Contacts/James/DeMeuse"));
/// assert_eq!(ctx.save_changes().await.unwrap(), 1);
/// assert!(james.rev().is_some());
/// # });
/// ```
pub struct DataContext<P: StoreProvider> {
    provider: P,
    store: P::Store,
    config: ContextConfig,
    dbsets: BTreeMap<String, DbSetDefinition>,
    state: Mutex<TrackingState>,
    transactions: Mutex<TransactionContext>,
    catalog: DatabaseCatalog,
    observers: RwLock<Vec<Arc<dyn SaveObserver>>>,
}

impl<P: StoreProvider> DataContext<P> {
    /// Opens a context over the store named `name`.
    ///
    /// Loads the database catalog and, when configured, runs orphan cleanup
    /// (best-effort).
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or duplicate document type
    /// or an inconsistent split declaration, and a store error if the
    /// primary store cannot be opened.
    pub async fn open(
        provider: P,
        name: &str,
        config: ContextConfig,
        dbsets: impl IntoIterator<Item = DbSetConfig>,
    ) -> CoreResult<Self> {
        let mut definitions = BTreeMap::new();
        for dbset in dbsets {
            validate_dbset(&dbset)?;
            let document_type = dbset.document_type.clone();
            if definitions
                .insert(document_type.clone(), DbSetDefinition::new(dbset))
                .is_some()
            {
                return Err(CoreError::validation(format!(
                    "dbset {document_type} declared twice"
                )));
            }
        }

        let store = provider.open(name)?;
        let catalog = match &config.catalog_path {
            Some(path) => DatabaseCatalog::open(path),
            None => DatabaseCatalog::in_memory(),
        };
        let transactions = TransactionContext::new(config.correlation_ttl);

        let context = Self {
            provider,
            store,
            config,
            dbsets: definitions,
            state: Mutex::new(TrackingState::default()),
            transactions: Mutex::new(transactions),
            catalog,
            observers: RwLock::new(Vec::new()),
        };

        tracing::info!(
            store = name,
            dbsets = context.dbsets.len(),
            catalogued = context.catalog.len(),
            "opened data context"
        );

        if context.config.cleanup_on_open {
            context.cleanup_orphans().await;
        }
        Ok(context)
    }

    /// Returns the dbset for `document_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if no dbset was declared for the type.
    pub fn dbset(&self, document_type: &str) -> CoreResult<DbSet<'_, P>> {
        let definition =
            self.definition(document_type)
                .ok_or_else(|| CoreError::UnknownDocumentType {
                    name: document_type.to_string(),
                })?;
        Ok(DbSet::new(self, definition))
    }

    /// Returns the declared document types.
    pub fn document_types(&self) -> Vec<String> {
        self.dbsets.keys().cloned().collect()
    }

    /// Returns the primary store.
    pub fn store(&self) -> &P::Store {
        &self.store
    }

    /// Returns the store provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Returns the database catalog.
    pub fn catalog(&self) -> &DatabaseCatalog {
        &self.catalog
    }

    /// Returns the active split transaction of `document_type`.
    pub fn correlation(&self, document_type: &str) -> Option<CorrelationRecord> {
        self.transactions.lock().current(document_type).cloned()
    }

    /// Registers a save observer.
    pub fn add_observer(&self, observer: Arc<dyn SaveObserver>) {
        self.observers.write().push(observer);
    }

    /// Returns true if the next save has anything to write.
    pub fn has_pending_changes(&self) -> bool {
        self.pending_counts().total() > 0
    }

    /// Returns the sizes of the pending change set.
    pub fn pending_counts(&self) -> PendingCounts {
        let state = self.state.lock();
        let pending = &state.pending;
        let removal_ids = pending.removal_ids();
        let updated = state
            .registry
            .filter(|entity| {
                entity.is_dirty() && entity.id().is_some_and(|id| !removal_ids.contains(id))
            })
            .len();
        PendingCounts {
            added: pending.add.len(),
            removed: pending.remove.len() + pending.remove_by_id.len(),
            updated,
        }
    }

    /// Returns true if an entity with `id` is tracked.
    pub fn is_tracked(&self, id: &str) -> bool {
        self.state.lock().registry.contains(id)
    }

    /// Returns the number of tracked entities.
    pub fn tracked_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Creates an index on the primary store.
    ///
    /// # Errors
    ///
    /// Returns a store error if the definition is rejected.
    pub async fn create_index<I, S>(&self, fields: I, name: &str) -> CoreResult<IndexDefinition>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = IndexDefinition::new(name, fields.into_iter().map(Into::into).collect());
        self.store.create_index(index.clone()).await?;
        tracing::debug!(index = name, fields = ?index.fields, "created index");
        Ok(index)
    }

    /// Lists the primary store's indexes.
    ///
    /// # Errors
    ///
    /// Returns a store error if the store is closed.
    pub async fn list_indexes(&self) -> CoreResult<Vec<IndexDefinition>> {
        Ok(self.store.list_indexes().await?)
    }

    /// Deletes an index from the primary store.
    ///
    /// # Errors
    ///
    /// Returns a store error if no such index exists.
    pub async fn delete_index(&self, name: &str) -> CoreResult<()> {
        self.store.delete_index(name).await?;
        Ok(())
    }

    /// Destroys the primary store and every catalogued secondary store.
    ///
    /// Secondary stores are destroyed best-effort.
    ///
    /// # Errors
    ///
    /// Returns a store error if the primary store cannot be destroyed.
    pub async fn destroy(self) -> CoreResult<()> {
        for name in self.catalog.names() {
            match self.provider.open(&name) {
                Ok(store) => {
                    self.destroy_secondary(&store).await;
                }
                Err(e) => tracing::warn!(database = %name, error = %e, "cannot open secondary database"),
            }
        }
        self.store.destroy().await?;
        tracing::info!(store = self.store.name(), "destroyed data context");
        Ok(())
    }

    pub(crate) fn definition(&self, document_type: &str) -> Option<&DbSetDefinition> {
        self.dbsets.get(document_type)
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, TrackingState> {
        self.state.lock()
    }

    pub(crate) fn transactions(&self) -> MutexGuard<'_, TransactionContext> {
        self.transactions.lock()
    }

    /// Non-strict bulk get: missing ids are skipped.
    pub(crate) async fn get_documents(&self, ids: &[String]) -> CoreResult<Vec<Document>> {
        match self.store.bulk_get(ids).await {
            Ok(results) => Ok(results
                .into_iter()
                .filter_map(FetchResult::into_document)
                .collect()),
            Err(e) => self.recover_read(e),
        }
    }

    /// Non-strict find.
    pub(crate) async fn find_documents(&self, request: FindRequest) -> CoreResult<Vec<Document>> {
        match self.store.find(request).await {
            Ok(docs) => Ok(docs),
            Err(e) => self.recover_read(e),
        }
    }

    /// Strict bulk get: every id must exist with the expected document type.
    pub(crate) async fn fetch_strict(
        &self,
        ids: &[String],
        document_type: &str,
    ) -> CoreResult<Vec<Document>> {
        let results = self.store.bulk_get(ids).await?;
        let mut docs = Vec::with_capacity(results.len());
        let mut missing = Vec::new();
        for result in results {
            match result {
                FetchResult::Found(doc) if doc.document_type == document_type => docs.push(doc),
                FetchResult::Found(doc) => missing.push(doc.id),
                FetchResult::Missing { id } => missing.push(id),
            }
        }
        if missing.is_empty() {
            Ok(docs)
        } else {
            Err(CoreError::not_found(missing))
        }
    }

    fn recover_read<T: Default>(&self, error: StoreError) -> CoreResult<T> {
        if error.is_closed() {
            return Err(error.into());
        }
        if error.is_not_found() || self.config.mask_query_errors {
            tracing::warn!(error = %error, "read failed; returning no results");
            return Ok(T::default());
        }
        Err(error.into())
    }

    /// Materialises stored documents as tracked entities.
    ///
    /// An id already in the registry keeps its handle; a clean handle is
    /// refreshed if the store holds a newer revision.
    pub(crate) fn track_documents(&self, docs: Vec<Document>) -> CoreResult<Vec<EntityRef>> {
        let mut state = self.state.lock();
        let mut tracked = Vec::with_capacity(docs.len());
        for doc in docs {
            if let Some(existing) = state.registry.get(&doc.id).cloned() {
                {
                    let mut entity = existing.write();
                    if !entity.is_dirty() && entity.rev() != doc.rev.as_deref() {
                        entity.reload(doc);
                    }
                }
                tracked.push(existing);
            } else {
                let handle = EntityRef::new(Entity::from_document(doc));
                state.registry.insert(handle.clone())?;
                tracked.push(handle);
            }
        }
        Ok(tracked)
    }

    /// Returns the primary wire form of an entity; split references stay in memory.
    pub(crate) fn wire_document(&self, entity: &Entity) -> Document {
        let mut doc = entity.to_document();
        if let Some(split) = self
            .definition(entity.document_type())
            .and_then(DbSetDefinition::split)
        {
            doc.fields.remove(&split.reference_field);
        }
        doc
    }

    fn has_split_dbsets(&self) -> bool {
        self.dbsets.values().any(|def| def.split().is_some())
    }
}

fn validate_dbset(dbset: &DbSetConfig) -> CoreResult<()> {
    if dbset.document_type.is_empty() {
        return Err(CoreError::validation("dbset document type must not be empty"));
    }
    let Some(split) = &dbset.split else {
        return Ok(());
    };
    if split.reference_field.is_empty()
        || split.locator_field.is_empty()
        || split.reference_field == split.locator_field
    {
        return Err(CoreError::validation(format!(
            "dbset {} needs distinct reference and locator fields",
            dbset.document_type
        )));
    }
    if Document::is_reserved(&split.reference_field) || Document::is_reserved(&split.locator_field)
    {
        return Err(CoreError::validation(format!(
            "dbset {} uses an envelope field for split handling",
            dbset.document_type
        )));
    }
    if let SplitMode::Unmanaged { database_name } = &split.mode {
        if database_name.is_empty() {
            return Err(CoreError::validation(format!(
                "unmanaged dbset {} needs a database name",
                dbset.document_type
            )));
        }
    }
    Ok(())
}

/// Reads a text field.
pub(crate) fn text_field<'a>(entity: &'a Entity, name: &str) -> Option<&'a str> {
    entity.get(name).and_then(Value::as_text)
}
