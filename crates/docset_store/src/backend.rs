//! Document store trait definition.

use crate::error::StoreResult;
use crate::selector::Selector;
use crate::types::{
    FetchResult, FindRequest, IndexDefinition, ReplicationReport, ReplicationStatus, WriteResult,
};
use docset_codec::Document;

/// An eventually-consistent document store.
///
/// This is the only surface through which docset touches storage. Stores
/// offer single-document optimistic concurrency (a write must present the
/// current revision) and bulk writes with per-document partial failure.
/// There is no multi-document transaction.
///
/// # Invariants
///
/// - `bulk_write` attempts every document and returns one result per input,
///   in input order
/// - A document with `deleted == true` is a deletion
/// - `bulk_get` returns one result per requested id, in request order
/// - Deleted documents are invisible to `find`, `bulk_get` and `doc_count`
///
/// # Implementors
///
/// - [`super::MemoryStore`] - For testing and ephemeral use
#[allow(async_fn_in_trait)]
pub trait DocumentStore: Send + Sync {
    /// Returns the store name.
    fn name(&self) -> &str;

    /// Writes a batch of documents.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store as a whole cannot accept the
    /// batch (e.g. it is closed). Individual failures are reported as
    /// [`WriteResult::Rejected`].
    async fn bulk_write(&self, docs: Vec<Document>) -> StoreResult<Vec<WriteResult>>;

    /// Returns live documents matching the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or the index hint is unknown.
    async fn find(&self, request: FindRequest) -> StoreResult<Vec<Document>>;

    /// Fetches documents by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed. Missing ids are reported as
    /// [`FetchResult::Missing`].
    async fn bulk_get(&self, ids: &[String]) -> StoreResult<Vec<FetchResult>>;

    /// Returns the number of live documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    async fn doc_count(&self) -> StoreResult<usize>;

    /// Lists the store's indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    async fn list_indexes(&self) -> StoreResult<Vec<IndexDefinition>>;

    /// Creates (or replaces) an index.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid or the store is closed.
    async fn create_index(&self, index: IndexDefinition) -> StoreResult<()>;

    /// Deletes an index by name.
    ///
    /// # Errors
    ///
    /// Returns an error if no such index exists or the store is closed.
    async fn delete_index(&self, name: &str) -> StoreResult<()>;

    /// Irreversibly deletes the store and all its documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is already closed.
    async fn destroy(&self) -> StoreResult<()>;

    /// Copies live documents (optionally filtered) into `target`.
    ///
    /// Documents already present in the target are overwritten at the
    /// target's current revision.
    ///
    /// # Errors
    ///
    /// Returns an error if either store is closed.
    async fn replicate_to<T: DocumentStore>(
        &self,
        target: &T,
        filter: Option<&Selector>,
    ) -> StoreResult<ReplicationReport> {
        let selector = filter.cloned().unwrap_or(Selector::All);
        let mut docs = self.find(FindRequest::new(selector)).await?;

        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        let existing = target.bulk_get(&ids).await?;
        for (doc, current) in docs.iter_mut().zip(existing) {
            doc.rev = current.into_document().and_then(|d| d.rev);
        }

        let results = target.bulk_write(docs).await?;
        let docs_written = results.iter().filter(|r| r.is_ok()).count();
        let errors: Vec<WriteResult> = results.into_iter().filter(|r| !r.is_ok()).collect();
        let status = if errors.is_empty() {
            ReplicationStatus::Complete
        } else {
            ReplicationStatus::Partial
        };

        tracing::debug!(
            source = self.name(),
            target = target.name(),
            docs_written,
            errors = errors.len(),
            "replication finished"
        );

        Ok(ReplicationReport {
            status,
            docs_written,
            errors,
        })
    }
}

/// Opens named stores.
///
/// Secondary stores of split documents are created and destroyed by name,
/// so the core needs a way to reach any store, not just the primary.
pub trait StoreProvider: Send + Sync {
    /// The store type this provider opens.
    type Store: DocumentStore;

    /// Opens (creating if necessary) the store with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    fn open(&self, name: &str) -> StoreResult<Self::Store>;
}
