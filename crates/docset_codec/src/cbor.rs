//! CBOR encoding of values and documents.

use crate::document::Document;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encode a value to CBOR bytes.
///
/// Map keys are emitted in sorted order, so equal values always encode to
/// identical bytes.
///
/// # Errors
///
/// Returns an error if the underlying serializer fails.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(format!("{e:?}")))?;
    Ok(buf)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR for a [`Value`].
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(format!("{e:?}")))
}

/// Encode a document in its flat wire form.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn encode_document(doc: &Document) -> CodecResult<Vec<u8>> {
    to_cbor(&doc.to_value())
}

/// Decode a document from its flat wire form.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid wire document.
pub fn decode_document(bytes: &[u8]) -> CodecResult<Document> {
    Document::from_value(from_cbor(bytes)?)
}
