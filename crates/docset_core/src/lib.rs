//! # docset core
//!
//! A unit-of-work layer over a document store.
//!
//! This crate provides:
//! - Change tracking: entities record the original value of every field
//!   the first time it changes and report themselves dirty without any
//!   explicit "mark changed" call
//! - Reconciliation: [`DataContext::save_changes`] turns pending adds,
//!   removals and dirty entities into one bulk write, applies the returned
//!   revisions and keeps rejected writes pending for retry
//! - Split documents: an entity can keep a reference sub-document in a
//!   separate secondary store, correlated per save cycle and garbage
//!   collected when orphaned
//! - Key derivation (random, constant or composite ids), reference
//!   locators and per-read index selection
//!
//! ## Guarantees
//!
//! The underlying store only offers single-document optimistic concurrency
//! and bulk writes with per-document failure. A save therefore either
//! returns the number of documents written, with every rejected change
//! still pending, or fails with the pending change set untouched.
//!
//! ## Example
//!
//! ```rust
//! use docset_core::{ContextConfig, DataContext, DbSetConfig, SplitConfig};
//! use docset_codec::Value;
//! use docset_store::{MemoryServer, Selector};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let notes = DbSetConfig::new("Notes").split(SplitConfig::managed());
//! let ctx = DataContext::open(MemoryServer::new(), "app", ContextConfig::default(), [notes])
//!     .await
//!     .unwrap();
//!
//! let set = ctx.dbset("Notes").unwrap();
//! set.add(
//!     set.create()
//!         .with_field("title", "Groceries")
//!         .with_field("reference", Value::map([("contents", "Milk")])),
//! )
//! .unwrap();
//! ctx.save_changes().await.unwrap();
//!
//! let note = set.first(Selector::eq("title", "Groceries")).await.unwrap().unwrap();
//! let reference = note.get("reference").unwrap();
//! assert_eq!(reference.get("contents"), Some(&Value::from("Milk")));
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod collection;
mod config;
mod context;
mod entity;
mod error;
mod index;
mod key;
mod observer;
mod reference;
mod transaction;

pub use catalog::DatabaseCatalog;
pub use collection::{
    DbSet, DbSetConfig, SplitConfig, SplitMode, DEFAULT_LOCATOR_FIELD, DEFAULT_REFERENCE_FIELD,
};
pub use config::{ContextConfig, DEFAULT_REFERENCE_SUFFIX};
pub use context::{CleanupReport, DataContext};
pub use entity::{AttachmentRegistry, Entity, EntityRef, DIRTY_MARKER, TRACKED_MARKER};
pub use error::{CoreError, CoreResult};
pub use index::IndexSelector;
pub use key::{KeyComponent, KeySelector, KeyStrategy};
pub use observer::SaveObserver;
pub use reference::{ReferenceLocator, REFERENCE_SCHEME};
pub use transaction::{CorrelationRecord, PendingCounts, TransactionContext};
