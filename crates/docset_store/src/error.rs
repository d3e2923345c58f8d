//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
///
/// Per-document write failures are not errors; they are reported as
/// [`crate::WriteResult::Rejected`] entries of a bulk write.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document id does not exist (or is deleted).
    #[error("document not found: {id}")]
    NotFound {
        /// The missing id.
        id: String,
    },

    /// The store has been destroyed or closed.
    #[error("store is closed: {name}")]
    Closed {
        /// Name of the store.
        name: String,
    },

    /// A query named an index that does not exist.
    #[error("unknown index: {name}")]
    UnknownIndex {
        /// Name of the index.
        name: String,
    },

    /// An index definition was rejected.
    #[error("invalid index: {message}")]
    InvalidIndex {
        /// Description of the problem.
        message: String,
    },

    /// The store could not service the request.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// Stored bytes could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] docset_codec::CodecError),
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a closed-store error.
    pub fn closed(name: impl Into<String>) -> Self {
        Self::Closed { name: name.into() }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Returns true if the store itself is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns true if the error only reports a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
