//! # docset testkit
//!
//! Test utilities for docset.
//!
//! This crate provides:
//! - Fixtures: ready-made dbset declarations and a context over an
//!   in-memory server
//! - Property-based test generators using proptest
//! - A fault-injecting store provider for exercising partial failures
//! - Test logging setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docset_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn saves_a_contact() {
//!     let ctx = TestContext::open().await;
//!     let contacts = ctx.dbset(CONTACTS).unwrap();
//!     contacts.add(contact("James", "DeMeuse")).unwrap();
//!     assert_eq!(ctx.save_changes().await.unwrap(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faulty;
pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faulty::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use faulty::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::*;
