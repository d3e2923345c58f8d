//! Error types for docset core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in docset core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Document store error.
    #[error("store error: {0}")]
    Store(#[from] docset_store::StoreError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] docset_codec::CodecError),

    /// I/O error (database catalog file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A caller-supplied entity or argument is not acceptable.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// The same id was marked for removal twice in one save cycle.
    #[error("entity already marked for removal: {id}")]
    DuplicateRemoval {
        /// The id marked twice.
        id: String,
    },

    /// A managed split entity was added with a reference that already
    /// carries manager-assigned fields.
    #[error("reference of {id} carries _id, _rev or DocumentType; these are assigned on save")]
    ReservedReferenceFields {
        /// Id of the primary entity.
        id: String,
    },

    /// A strict fetch did not find every requested id.
    #[error("documents not found: {}", ids.join(", "))]
    NotFound {
        /// Every missing id.
        ids: Vec<String>,
    },

    /// No dbset is registered for a document type.
    #[error("unknown document type: {name}")]
    UnknownDocumentType {
        /// The document type.
        name: String,
    },
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a not-found error for the given ids.
    pub fn not_found(ids: Vec<String>) -> Self {
        Self::NotFound { ids }
    }

    /// Returns true for errors raised before anything touched the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::DuplicateRemoval { .. }
                | Self::ReservedReferenceFields { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_ids() {
        let err = CoreError::not_found(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "documents not found: a, b");
    }

    #[test]
    fn validation_classification() {
        assert!(CoreError::validation("x").is_validation());
        assert!(CoreError::DuplicateRemoval { id: "a".into() }.is_validation());
        assert!(!CoreError::not_found(vec![]).is_validation());
        let store: CoreError = docset_store::StoreError::closed("db").into();
        assert!(!store.is_validation());
    }
}
