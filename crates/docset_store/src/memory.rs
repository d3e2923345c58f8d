//! In-memory document store.

use crate::backend::{DocumentStore, StoreProvider};
use crate::error::{StoreError, StoreResult};
use crate::types::{FetchResult, FindRequest, IndexDefinition, WriteRejection, WriteResult};
use docset_codec::{decode_document, encode_document, Document};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// A set of named in-memory stores.
///
/// Opening the same name twice yields handles onto the same data, and a
/// destroyed name starts empty when reopened. Cloning the server shares it.
///
/// # Example
///
/// ```rust
/// use docset_store::{MemoryServer, StoreProvider, DocumentStore};
///
/// let server = MemoryServer::new();
/// let store = server.open("Contacts").unwrap();
/// assert_eq!(store.name(), "Contacts");
/// assert!(server.exists("Contacts"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    stores: Arc<Mutex<HashMap<String, Arc<StoreState>>>>,
}

impl MemoryServer {
    /// Creates an empty server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a store with this name is open.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.stores.lock().contains_key(name)
    }

    /// Returns the names of all open stores, sorted.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl StoreProvider for MemoryServer {
    type Store = MemoryStore;

    fn open(&self, name: &str) -> StoreResult<MemoryStore> {
        let state = Arc::clone(
            self.stores
                .lock()
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(StoreState::new(name))),
        );
        Ok(MemoryStore {
            state,
            server: self.clone(),
        })
    }
}

#[derive(Debug)]
struct StoreState {
    name: String,
    closed: AtomicBool,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    docs: BTreeMap<String, StoredDoc>,
    indexes: BTreeMap<String, IndexDefinition>,
}

#[derive(Debug)]
struct StoredDoc {
    rev: String,
    generation: u64,
    deleted: bool,
    bytes: Vec<u8>,
}

impl StoreState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            closed: AtomicBool::new(false),
            inner: RwLock::new(Inner::default()),
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::closed(&self.name))
        } else {
            Ok(())
        }
    }
}

impl StoredDoc {
    fn decode(&self) -> StoreResult<Document> {
        let mut doc = decode_document(&self.bytes)?;
        doc.rev = Some(self.rev.clone());
        Ok(doc)
    }
}

/// A handle onto one named in-memory store.
///
/// Documents are kept encoded, so callers never alias stored state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<StoreState>,
    server: MemoryServer,
}

impl MemoryStore {
    fn write_one(inner: &mut Inner, mut doc: Document) -> StoreResult<WriteResult> {
        if doc.id.is_empty() {
            return Ok(WriteResult::Rejected {
                id: doc.id,
                reason: WriteRejection::Invalid("empty id".into()),
            });
        }

        let existing = inner.docs.get(&doc.id);
        let live = existing.filter(|d| !d.deleted);
        let reject = |id: String, reason| Ok(WriteResult::Rejected { id, reason });

        if doc.deleted {
            match live {
                None => return reject(doc.id, WriteRejection::NotFound),
                Some(current) if doc.rev.as_deref() != Some(current.rev.as_str()) => {
                    return reject(doc.id, WriteRejection::Conflict)
                }
                Some(_) => {}
            }
        } else {
            match (live, existing, doc.rev.as_deref()) {
                (Some(current), _, rev) if rev != Some(current.rev.as_str()) => {
                    return reject(doc.id, WriteRejection::Conflict)
                }
                (None, None, Some(_)) => return reject(doc.id, WriteRejection::Conflict),
                (None, Some(tombstone), Some(rev)) if rev != tombstone.rev => {
                    return reject(doc.id, WriteRejection::Conflict)
                }
                _ => {}
            }
        }

        let generation = existing.map_or(0, |d| d.generation) + 1;
        let rev = format!("{generation}-{}", Uuid::new_v4().simple());
        if doc.deleted {
            doc = doc.to_deletion_stub();
        }
        doc.rev = Some(rev.clone());
        let bytes = encode_document(&doc)?;

        inner.docs.insert(
            doc.id.clone(),
            StoredDoc {
                rev: rev.clone(),
                generation,
                deleted: doc.deleted,
                bytes,
            },
        );
        Ok(WriteResult::Written { id: doc.id, rev })
    }
}

impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        &self.state.name
    }

    async fn bulk_write(&self, docs: Vec<Document>) -> StoreResult<Vec<WriteResult>> {
        self.state.ensure_open()?;
        let mut inner = self.state.inner.write();
        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            let result = Self::write_one(&mut inner, doc)?;
            if let WriteResult::Rejected { id, reason } = &result {
                tracing::debug!(store = %self.state.name, %id, %reason, "document rejected");
            }
            results.push(result);
        }
        Ok(results)
    }

    async fn find(&self, request: FindRequest) -> StoreResult<Vec<Document>> {
        self.state.ensure_open()?;
        let inner = self.state.inner.read();
        if let Some(index) = &request.index {
            if !inner.indexes.contains_key(index) {
                return Err(StoreError::UnknownIndex {
                    name: index.clone(),
                });
            }
        }

        let limit = request.limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        for stored in inner.docs.values().filter(|d| !d.deleted) {
            if out.len() >= limit {
                break;
            }
            let doc = stored.decode()?;
            if request.selector.matches(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }

    async fn bulk_get(&self, ids: &[String]) -> StoreResult<Vec<FetchResult>> {
        self.state.ensure_open()?;
        let inner = self.state.inner.read();
        ids.iter()
            .map(|id| -> StoreResult<FetchResult> {
                match inner.docs.get(id).filter(|d| !d.deleted) {
                    Some(stored) => Ok(FetchResult::Found(stored.decode()?)),
                    None => Ok(FetchResult::Missing { id: id.clone() }),
                }
            })
            .collect()
    }

    async fn doc_count(&self) -> StoreResult<usize> {
        self.state.ensure_open()?;
        Ok(self
            .state
            .inner
            .read()
            .docs
            .values()
            .filter(|d| !d.deleted)
            .count())
    }

    async fn list_indexes(&self) -> StoreResult<Vec<IndexDefinition>> {
        self.state.ensure_open()?;
        Ok(self.state.inner.read().indexes.values().cloned().collect())
    }

    async fn create_index(&self, index: IndexDefinition) -> StoreResult<()> {
        self.state.ensure_open()?;
        if index.name.is_empty() || index.fields.is_empty() {
            return Err(StoreError::InvalidIndex {
                message: "an index needs a name and at least one field".into(),
            });
        }
        self.state
            .inner
            .write()
            .indexes
            .insert(index.name.clone(), index);
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> StoreResult<()> {
        self.state.ensure_open()?;
        match self.state.inner.write().indexes.remove(name) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownIndex {
                name: name.to_string(),
            }),
        }
    }

    async fn destroy(&self) -> StoreResult<()> {
        self.state.ensure_open()?;
        self.state.closed.store(true, Ordering::SeqCst);
        *self.state.inner.write() = Inner::default();

        let mut stores = self.server.stores.lock();
        if stores
            .get(&self.state.name)
            .is_some_and(|s| Arc::ptr_eq(s, &self.state))
        {
            stores.remove(&self.state.name);
        }
        tracing::debug!(store = %self.state.name, "store destroyed");
        Ok(())
    }
}
