//! # docset store
//!
//! The document store contract consumed by docset, and an in-memory
//! implementation of it.
//!
//! docset never owns storage, indexing or replication. It reaches the
//! underlying store only through [`DocumentStore`]: bulk write, find, bulk
//! get, index management, replicate and destroy.
//!
//! ## Design Principles
//!
//! - Single-document optimistic concurrency via revision tokens
//! - Bulk writes attempt every document and may partially fail
//! - No cross-document transaction or ordering guarantee
//! - Stores are reached by name through a [`StoreProvider`]
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] (opened from a [`MemoryServer`]) - For testing and ephemeral use
//!
//! ## Example
//!
//! ```rust
//! use docset_codec::Document;
//! use docset_store::{DocumentStore, MemoryServer, StoreProvider};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = MemoryServer::new().open("Contacts").unwrap();
//! let results = store
//!     .bulk_write(vec![Document::new("c1", "Contacts").with_field("name", "Ann")])
//!     .await
//!     .unwrap();
//! assert!(results[0].is_ok());
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod selector;
mod types;

pub use backend::{DocumentStore, StoreProvider};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryServer, MemoryStore};
pub use selector::Selector;
pub use types::{
    FetchResult, FindRequest, IndexDefinition, ReplicationReport, ReplicationStatus,
    WriteRejection, WriteResult,
};
