//! Reference locators.
//!
//! A locator points from a primary document to the secondary document its
//! split-off reference lives in:
//!
//! ```text
//! docset://<database name>/<property>:<value>
//! ```
//!
//! All three components are percent-encoded, so a database name containing
//! `/` or a value containing `:` still round-trips.

use docset_codec::ID_FIELD;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::borrow::Cow;
use std::fmt;

/// Scheme of every locator.
pub const REFERENCE_SCHEME: &str = "docset";

const SCHEME_SEPARATOR: &str = "://";

/// Decoded form of a reference locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceLocator {
    /// Name of the secondary database.
    pub database_name: String,
    /// Field the value selects on (usually `_id`).
    pub property: String,
    /// Selected value.
    pub value: String,
}

impl ReferenceLocator {
    /// Creates a locator.
    pub fn new(
        database_name: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            database_name: database_name.into(),
            property: property.into(),
            value: value.into(),
        }
    }

    /// Creates a locator selecting a document by id.
    pub fn for_id(database_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(database_name, ID_FIELD, id)
    }

    /// Returns true if the locator selects by document id.
    pub fn selects_id(&self) -> bool {
        self.property == ID_FIELD
    }

    /// Encodes the locator.
    pub fn encode(&self) -> String {
        format!(
            "{}{}:{}",
            Self::store_prefix(&self.database_name),
            percent_encode(&self.property),
            percent_encode(&self.value)
        )
    }

    /// Decodes a locator, returning `None` for anything malformed.
    ///
    /// A string with the wrong scheme, no `/` after the database name, no
    /// `property:value` pair, an empty database name or property, or a bad
    /// escape sequence is not a reference.
    pub fn decode(encoded: &str) -> Option<Self> {
        let rest = encoded
            .strip_prefix(REFERENCE_SCHEME)?
            .strip_prefix(SCHEME_SEPARATOR)?;
        let (name, selector) = rest.split_once('/')?;
        let (property, value) = selector.split_once(':')?;
        if name.is_empty() || property.is_empty() {
            return None;
        }

        Some(Self {
            database_name: percent_decode(name)?,
            property: percent_decode(property)?,
            value: percent_decode(value)?,
        })
    }

    /// Returns the prefix shared by every locator into `database_name`.
    pub fn store_prefix(database_name: &str) -> String {
        format!(
            "{REFERENCE_SCHEME}{SCHEME_SEPARATOR}{}/",
            percent_encode(database_name)
        )
    }
}

impl fmt::Display for ReferenceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Bytes escaped inside a locator component: everything but the RFC 3986
/// unreserved set.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

fn percent_decode(input: &str) -> Option<String> {
    // percent_decode_str passes malformed escapes through unchanged
    let well_formed = input.split('%').skip(1).all(|escape| {
        escape.len() >= 2 && escape.as_bytes()[..2].iter().all(u8::is_ascii_hexdigit)
    });
    if !well_formed {
        return None;
    }
    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encodes_readable_locator() {
        let locator = ReferenceLocator::for_id("Notes_abc_REFERENCE_db", "3fa-77");
        assert_eq!(
            locator.encode(),
            "docset://Notes_abc_REFERENCE_db/_id:3fa-77"
        );
        assert!(locator.selects_id());
    }

    #[test]
    fn escapes_separators() {
        let locator = ReferenceLocator::new("a/b", "p:q", "x y/z%");
        let encoded = locator.encode();
        assert_eq!(encoded, "docset://a%2Fb/p%3Aq:x%20y%2Fz%25");
        assert_eq!(ReferenceLocator::decode(&encoded), Some(locator));
    }

    #[test]
    fn rejects_malformed() {
        for bad in [
            "",
            "pouchdb://db/_id:1",
            "docset:/db/_id:1",
            "docset://db",
            "docset://db/",
            "docset://db/_id",
            "docset:///_id:1",
            "docset://db/:1",
            "docset://db/_id:%zz",
            "docset://db/_id:%4",
            "docset://db/_id:%FF",
        ] {
            assert_eq!(ReferenceLocator::decode(bad), None, "{bad}");
        }
    }

    #[test]
    fn empty_value_is_allowed() {
        let locator = ReferenceLocator::decode("docset://db/_id:").unwrap();
        assert_eq!(locator.value, "");
    }

    #[test]
    fn prefix_matches_encoded_locators() {
        let locator = ReferenceLocator::for_id("Notes db", "1");
        assert!(locator
            .encode()
            .starts_with(&ReferenceLocator::store_prefix("Notes db")));
        assert!(!ReferenceLocator::for_id("Notes dbx", "1")
            .encode()
            .starts_with(&ReferenceLocator::store_prefix("Notes db")));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            name in "\\PC{1,24}",
            property in "\\PC{1,12}",
            value in "\\PC{0,40}",
        ) {
            let locator = ReferenceLocator::new(name, property, value);
            prop_assert_eq!(ReferenceLocator::decode(&locator.encode()), Some(locator));
        }

        #[test]
        fn decode_never_panics(input in "\\PC{0,64}") {
            let _ = ReferenceLocator::decode(&input);
        }
    }
}
