//! Request and result types of the document store contract.

use crate::selector::Selector;
use docset_codec::Document;
use std::fmt;

/// Why a single document in a bulk write was not written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRejection {
    /// The supplied revision does not match the stored one.
    Conflict,
    /// The document to delete does not exist.
    NotFound,
    /// The document itself is malformed.
    Invalid(String),
}

impl fmt::Display for WriteRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteRejection::Conflict => f.write_str("conflict"),
            WriteRejection::NotFound => f.write_str("not_found"),
            WriteRejection::Invalid(reason) => write!(f, "invalid: {reason}"),
        }
    }
}

/// Per-document outcome of a bulk write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// The document was written and received a new revision.
    Written {
        /// Document id.
        id: String,
        /// New revision token.
        rev: String,
    },
    /// The document was not written.
    Rejected {
        /// Document id.
        id: String,
        /// Reason for the rejection.
        reason: WriteRejection,
    },
}

impl WriteResult {
    /// Returns the document id.
    pub fn id(&self) -> &str {
        match self {
            WriteResult::Written { id, .. } | WriteResult::Rejected { id, .. } => id,
        }
    }

    /// Returns the new revision if the write succeeded.
    pub fn rev(&self) -> Option<&str> {
        match self {
            WriteResult::Written { rev, .. } => Some(rev),
            WriteResult::Rejected { .. } => None,
        }
    }

    /// Returns true if the write succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }
}

/// Per-id outcome of a bulk get.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// The document exists.
    Found(Document),
    /// No live document with this id.
    Missing {
        /// The requested id.
        id: String,
    },
}

impl FetchResult {
    /// Returns the document if it was found.
    pub fn into_document(self) -> Option<Document> {
        match self {
            FetchResult::Found(doc) => Some(doc),
            FetchResult::Missing { .. } => None,
        }
    }
}

/// A `find` query.
#[derive(Debug, Clone, PartialEq)]
pub struct FindRequest {
    /// Predicate documents must satisfy.
    pub selector: Selector,
    /// Optional index hint; the store rejects unknown names.
    pub index: Option<String>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl FindRequest {
    /// Creates a request with no index hint and no limit.
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            index: None,
            limit: None,
        }
    }

    /// Sets the index hint.
    #[must_use]
    pub fn with_index(mut self, index: Option<String>) -> Self {
        self.index = index;
        self
    }

    /// Sets the result limit.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A secondary index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name, unique per store.
    pub name: String,
    /// Indexed field names, in order.
    pub fields: Vec<String>,
    /// Design document holding the index.
    pub design_doc: String,
}

impl IndexDefinition {
    /// Creates an index definition whose design document is derived from its name.
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        let name = name.into();
        Self {
            design_doc: format!("_design/{name}"),
            name,
            fields,
        }
    }
}

/// Completion state of a replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationStatus {
    /// Every document was written.
    Complete,
    /// Some documents were rejected by the target.
    Partial,
}

/// Outcome of [`crate::DocumentStore::replicate_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationReport {
    /// Completion state.
    pub status: ReplicationStatus,
    /// Number of documents written to the target.
    pub docs_written: usize,
    /// Rejections reported by the target.
    pub errors: Vec<WriteResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_result_accessors() {
        let ok = WriteResult::Written {
            id: "a".into(),
            rev: "1-x".into(),
        };
        let bad = WriteResult::Rejected {
            id: "b".into(),
            reason: WriteRejection::Conflict,
        };
        assert!(ok.is_ok());
        assert_eq!(ok.rev(), Some("1-x"));
        assert!(!bad.is_ok());
        assert_eq!(bad.id(), "b");
        assert_eq!(bad.rev(), None);
    }

    #[test]
    fn index_design_doc_follows_name() {
        let index = IndexDefinition::new("by-name", vec!["lastName".into()]);
        assert_eq!(index.design_doc, "_design/by-name");
    }

    #[test]
    fn rejection_display() {
        assert_eq!(WriteRejection::Conflict.to_string(), "conflict");
        assert_eq!(
            WriteRejection::Invalid("empty id".into()).to_string(),
            "invalid: empty id"
        );
    }
}
