//! Predicate selectors for `find`.

use docset_codec::{Document, Value};
use std::cmp::Ordering;

/// A predicate over documents.
///
/// Field names are wire names, so `_id` and `DocumentType` address the
/// envelope and everything else addresses body fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Matches every document.
    All,
    /// Field equals the value.
    Eq(String, Value),
    /// Field is present and differs from the value.
    Ne(String, Value),
    /// Field equals one of the values.
    In(String, Vec<Value>),
    /// Field is strictly greater than the value.
    Gt(String, Value),
    /// Field is strictly less than the value.
    Lt(String, Value),
    /// Field is present.
    Exists(String),
    /// Text field starts with the prefix.
    StartsWith(String, String),
    /// Every selector matches.
    And(Vec<Selector>),
    /// At least one selector matches.
    Or(Vec<Selector>),
    /// The selector does not match.
    Not(Box<Selector>),
}

impl Selector {
    /// Equality shorthand.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    /// Prefix shorthand.
    pub fn starts_with(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::StartsWith(field.into(), prefix.into())
    }

    /// Combines two selectors with a logical AND, flattening nested ANDs.
    #[must_use]
    pub fn and(self, other: Selector) -> Self {
        match (self, other) {
            (Selector::All, s) | (s, Selector::All) => s,
            (Selector::And(mut a), Selector::And(b)) => {
                a.extend(b);
                Selector::And(a)
            }
            (Selector::And(mut a), s) => {
                a.push(s);
                Selector::And(a)
            }
            (s, Selector::And(mut b)) => {
                b.insert(0, s);
                Selector::And(b)
            }
            (a, b) => Selector::And(vec![a, b]),
        }
    }

    /// Evaluates the selector against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Selector::All => true,
            Selector::Eq(field, value) => doc
                .field(field)
                .is_some_and(|v| v.loosely_equals(value)),
            Selector::Ne(field, value) => doc
                .field(field)
                .is_some_and(|v| !v.loosely_equals(value)),
            Selector::In(field, values) => doc
                .field(field)
                .is_some_and(|v| values.iter().any(|c| v.loosely_equals(c))),
            Selector::Gt(field, value) => doc
                .field(field)
                .is_some_and(|v| compare(&v, value) == Some(Ordering::Greater)),
            Selector::Lt(field, value) => doc
                .field(field)
                .is_some_and(|v| compare(&v, value) == Some(Ordering::Less)),
            Selector::Exists(field) => doc.field(field).is_some(),
            Selector::StartsWith(field, prefix) => doc
                .field(field)
                .is_some_and(|v| v.as_text().is_some_and(|s| s.starts_with(prefix.as_str()))),
            Selector::And(all) => all.iter().all(|s| s.matches(doc)),
            Selector::Or(any) => any.iter().any(|s| s.matches(doc)),
            Selector::Not(inner) => !inner.matches(doc),
        }
    }
}

/// Orders numbers numerically and text lexicographically; other pairs are unordered.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        _ => a.as_float()?.partial_cmp(&b.as_float()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str, first: &str, age: i64) -> Document {
        Document::new(id, "Contacts")
            .with_field("firstName", first)
            .with_field("age", age)
    }

    #[test]
    fn equality_and_type() {
        let doc = contact("c1", "James", 40);
        assert!(Selector::eq("DocumentType", "Contacts").matches(&doc));
        assert!(Selector::eq("firstName", "James").matches(&doc));
        assert!(!Selector::eq("firstName", "Jim").matches(&doc));
        assert!(Selector::eq("age", 40.0).matches(&doc));
        assert!(!Selector::eq("missing", Value::Null).matches(&doc));
    }

    #[test]
    fn ranges_and_sets() {
        let doc = contact("c1", "James", 40);
        assert!(Selector::Gt("age".into(), Value::Integer(39)).matches(&doc));
        assert!(!Selector::Lt("age".into(), Value::Integer(40)).matches(&doc));
        assert!(Selector::Lt("firstName".into(), Value::from("K")).matches(&doc));
        assert!(!Selector::Gt("firstName".into(), Value::Integer(1)).matches(&doc));
        assert!(
            Selector::In("firstName".into(), vec!["Ann".into(), "James".into()]).matches(&doc)
        );
        assert!(Selector::Ne("firstName".into(), "Ann".into()).matches(&doc));
        assert!(!Selector::Ne("nope".into(), "Ann".into()).matches(&doc));
    }

    #[test]
    fn prefix_and_combinators() {
        let doc = Document::new("n1", "Notes").with_field("ref", "docset://Notes_db/_id:1");
        assert!(Selector::starts_with("ref", "docset://Notes_db/").matches(&doc));
        assert!(!Selector::starts_with("ref", "docset://Other/").matches(&doc));

        let both = Selector::eq("DocumentType", "Notes").and(Selector::Exists("ref".into()));
        assert!(both.matches(&doc));
        assert!(!Selector::Not(Box::new(both.clone())).matches(&doc));
        assert!(Selector::Or(vec![Selector::eq("_id", "zz"), both]).matches(&doc));
    }

    #[test]
    fn and_flattens() {
        let s = Selector::All
            .and(Selector::Exists("a".into()))
            .and(Selector::Exists("b".into()))
            .and(Selector::And(vec![Selector::Exists("c".into())]));
        match s {
            Selector::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }
}
