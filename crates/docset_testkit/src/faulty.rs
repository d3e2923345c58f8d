//! Fault injection for store providers.
//!
//! [`FaultyServer`] wraps a [`MemoryServer`] and can reject individual
//! documents, fail whole requests per store and record every bulk write it
//! forwards, so tests can check batch ordering and partial-failure handling.

use docset_codec::Document;
use docset_store::{
    DocumentStore, FetchResult, FindRequest, IndexDefinition, MemoryServer, MemoryStore,
    StoreError, StoreProvider, StoreResult, WriteRejection, WriteResult,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// One bulk write as received by a [`FaultyStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Name of the store written to.
    pub store: String,
    /// `(id, deleted)` of each document, in batch order.
    pub entries: Vec<(String, bool)>,
}

impl WriteRecord {
    /// Ids of the deletions in the batch.
    pub fn deletions(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, deleted)| *deleted)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    Write,
    Read,
    Destroy,
}

#[derive(Debug, Default)]
struct Faults {
    rejected_ids: HashSet<String>,
    failing_writes: HashSet<String>,
    failing_reads: HashSet<String>,
    failing_destroys: HashSet<String>,
    log: Vec<WriteRecord>,
}

impl Faults {
    fn failing(&self, operation: Operation) -> &HashSet<String> {
        match operation {
            Operation::Write => &self.failing_writes,
            Operation::Read => &self.failing_reads,
            Operation::Destroy => &self.failing_destroys,
        }
    }
}

/// A [`MemoryServer`] with injectable failures.
#[derive(Debug, Clone, Default)]
pub struct FaultyServer {
    inner: MemoryServer,
    faults: Arc<Mutex<Faults>>,
}

impl FaultyServer {
    /// Creates a server over a fresh in-memory server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the wrapped server.
    pub fn inner(&self) -> &MemoryServer {
        &self.inner
    }

    /// Rejects every write of the document `id` with a conflict.
    pub fn reject_id(&self, id: impl Into<String>) {
        self.faults.lock().rejected_ids.insert(id.into());
    }

    /// Fails every bulk write to `store`.
    pub fn fail_writes(&self, store: impl Into<String>) {
        self.faults.lock().failing_writes.insert(store.into());
    }

    /// Fails every read (find, get and count) of `store`.
    pub fn fail_reads(&self, store: impl Into<String>) {
        self.faults.lock().failing_reads.insert(store.into());
    }

    /// Fails every destroy of `store`.
    pub fn fail_destroy(&self, store: impl Into<String>) {
        self.faults.lock().failing_destroys.insert(store.into());
    }

    /// Removes every injected fault. The write log is kept.
    pub fn heal(&self) {
        let mut faults = self.faults.lock();
        faults.rejected_ids.clear();
        faults.failing_writes.clear();
        faults.failing_reads.clear();
        faults.failing_destroys.clear();
    }

    /// Returns every recorded bulk write, oldest first.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.faults.lock().log.clone()
    }

    /// Returns the recorded bulk writes to `store`.
    pub fn writes_to(&self, store: &str) -> Vec<WriteRecord> {
        self.faults
            .lock()
            .log
            .iter()
            .filter(|record| record.store == store)
            .cloned()
            .collect()
    }

    /// Forgets the recorded bulk writes.
    pub fn clear_log(&self) {
        self.faults.lock().log.clear();
    }
}

impl StoreProvider for FaultyServer {
    type Store = FaultyStore;

    fn open(&self, name: &str) -> StoreResult<FaultyStore> {
        Ok(FaultyStore {
            inner: self.inner.open(name)?,
            faults: Arc::clone(&self.faults),
        })
    }
}

/// A store handle opened by [`FaultyServer`].
#[derive(Debug, Clone)]
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Arc<Mutex<Faults>>,
}

impl FaultyStore {
    fn check(&self, operation: Operation) -> StoreResult<()> {
        let failing = self.faults.lock().failing(operation).contains(self.inner.name());
        if failing {
            return Err(StoreError::unavailable(format!(
                "injected failure on {}",
                self.inner.name()
            )));
        }
        Ok(())
    }
}

impl DocumentStore for FaultyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn bulk_write(&self, docs: Vec<Document>) -> StoreResult<Vec<WriteResult>> {
        self.check(Operation::Write)?;

        let mut slots = Vec::with_capacity(docs.len());
        let mut forwarded = Vec::with_capacity(docs.len());
        {
            let mut faults = self.faults.lock();
            faults.log.push(WriteRecord {
                store: self.inner.name().to_string(),
                entries: docs.iter().map(|d| (d.id.clone(), d.deleted)).collect(),
            });
            for doc in docs {
                if faults.rejected_ids.contains(&doc.id) {
                    slots.push(Some(WriteResult::Rejected {
                        id: doc.id,
                        reason: WriteRejection::Conflict,
                    }));
                } else {
                    slots.push(None);
                    forwarded.push(doc);
                }
            }
        }

        let mut written = self.inner.bulk_write(forwarded).await?.into_iter();
        Ok(slots
            .into_iter()
            .filter_map(|slot| slot.or_else(|| written.next()))
            .collect())
    }

    async fn find(&self, request: FindRequest) -> StoreResult<Vec<Document>> {
        self.check(Operation::Read)?;
        self.inner.find(request).await
    }

    async fn bulk_get(&self, ids: &[String]) -> StoreResult<Vec<FetchResult>> {
        self.check(Operation::Read)?;
        self.inner.bulk_get(ids).await
    }

    async fn doc_count(&self) -> StoreResult<usize> {
        self.check(Operation::Read)?;
        self.inner.doc_count().await
    }

    async fn list_indexes(&self) -> StoreResult<Vec<IndexDefinition>> {
        self.inner.list_indexes().await
    }

    async fn create_index(&self, index: IndexDefinition) -> StoreResult<()> {
        self.inner.create_index(index).await
    }

    async fn delete_index(&self, name: &str) -> StoreResult<()> {
        self.inner.delete_index(name).await
    }

    async fn destroy(&self) -> StoreResult<()> {
        self.check(Operation::Destroy)?;
        self.inner.destroy().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejected_ids_keep_batch_order() {
        let server = FaultyServer::new();
        server.reject_id("b");
        let store = server.open("app").unwrap();

        let results = store
            .bulk_write(vec![
                Document::new("a", "T"),
                Document::new("b", "T"),
                Document::new("c", "T"),
            ])
            .await
            .unwrap();

        let outcome: Vec<_> = results.iter().map(|r| (r.id(), r.is_ok())).collect();
        assert_eq!(outcome, vec![("a", true), ("b", false), ("c", true)]);
        assert_eq!(store.doc_count().await.unwrap(), 2);
        assert_eq!(server.writes_to("app").len(), 1);
    }

    #[tokio::test]
    async fn injected_failures_heal() {
        let server = FaultyServer::new();
        server.fail_reads("app");
        let store = server.open("app").unwrap();
        assert!(store.doc_count().await.is_err());

        server.heal();
        assert_eq!(store.doc_count().await.unwrap(), 0);
    }
}
