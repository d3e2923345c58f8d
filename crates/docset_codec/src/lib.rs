//! # docset codec
//!
//! Document value model and CBOR wire encoding for docset.
//!
//! This crate provides:
//! - [`Value`], the dynamic field value with loose structural equality
//! - [`Document`], the wire envelope (`_id`, `_rev`, `DocumentType`, `_deleted`)
//! - Deterministic CBOR encoding for values and documents
//!
//! ## Usage
//!
//! ```
//! use docset_codec::{decode_document, encode_document, Document};
//!
//! let doc = Document::new("Contacts/James/DeMeuse", "Contacts")
//!     .with_field("firstName", "James");
//! let bytes = encode_document(&doc).unwrap();
//! assert_eq!(decode_document(&bytes).unwrap(), doc);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod document;
mod error;
mod value;

pub use cbor::{decode_document, encode_document, from_cbor, to_cbor};
pub use document::{
    Document, DELETED_FIELD, DOCUMENT_TYPE_FIELD, ID_FIELD, RESERVED_FIELDS, REV_FIELD,
};
pub use error::{CodecError, CodecResult};
pub use value::Value;
