//! Correlation of managed split-document adds.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// The transaction a document type's managed split adds currently share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationRecord {
    /// Transaction id embedded in the secondary database name.
    pub transaction_id: String,
    /// Set once a second add has reused the record.
    pub in_use: bool,
    created: Instant,
}

/// Per-context correlation cache, keyed by document type.
///
/// Every managed split add of a document type within one save cycle shares
/// one transaction id, so those adds land in the same secondary store. A
/// record lives until the save completes, an entity of its type is removed,
/// or its time-to-live elapses.
#[derive(Debug)]
pub struct TransactionContext {
    ttl: Duration,
    records: HashMap<String, CorrelationRecord>,
}

impl TransactionContext {
    /// Creates an empty context whose records expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            records: HashMap::new(),
        }
    }

    fn cache_key(document_type: &str) -> String {
        format!("{document_type}_transaction")
    }

    /// Returns the transaction id for `document_type`, opening one if none is active.
    pub fn acquire(&mut self, document_type: &str) -> String {
        let key = Self::cache_key(document_type);
        let ttl = self.ttl;
        if let Some(record) = self
            .records
            .get_mut(&key)
            .filter(|record| record.created.elapsed() < ttl)
        {
            record.in_use = true;
            return record.transaction_id.clone();
        }

        let transaction_id = Uuid::new_v4().simple().to_string();
        tracing::debug!(document_type, %transaction_id, "opened split transaction");
        self.records.insert(
            key,
            CorrelationRecord {
                transaction_id: transaction_id.clone(),
                in_use: false,
                created: Instant::now(),
            },
        );
        transaction_id
    }

    /// Returns the active record for `document_type`.
    pub fn current(&self, document_type: &str) -> Option<&CorrelationRecord> {
        self.records
            .get(&Self::cache_key(document_type))
            .filter(|record| record.created.elapsed() < self.ttl)
    }

    /// Ends the active transaction for `document_type`.
    pub fn end(&mut self, document_type: &str) -> Option<CorrelationRecord> {
        self.records.remove(&Self::cache_key(document_type))
    }

    /// Ends every transaction.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Returns the number of records, expired ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
