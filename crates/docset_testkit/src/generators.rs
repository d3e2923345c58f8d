//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use docset_codec::Value;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating store names, including characters that need
/// escaping in a locator.
pub fn database_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_ /:%-]{0,23}").expect("Invalid regex")
}

/// Strategy for generating property names.
pub fn property_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z_][a-zA-Z0-9_.:]{0,15}").expect("Invalid regex")
}

/// Strategy for generating locator values: any non-empty text.
pub fn locator_value_strategy() -> impl Strategy<Value = String> {
    ".{1,32}"
}

/// Strategy for generating names usable in composite keys.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,11}").expect("Invalid regex")
}

/// Strategy for generating user field names (never reserved).
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9]{0,11}").expect("Invalid regex")
}

/// Strategy for generating scalar field values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9).prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
    ]
}

/// Strategy for generating nested field values.
pub fn field_value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for generating a user field map.
pub fn field_map_strategy() -> impl Strategy<Value = BTreeMap<String, Value>> {
    prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..8)
}

/// Strategy for generating distinct `(first, last)` name pairs.
pub fn contact_names_strategy(max: usize) -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_set((name_strategy(), name_strategy()), 1..=max.max(1))
        .prop_map(|names| names.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn field_names_are_not_reserved(name in field_name_strategy()) {
            prop_assert!(!docset_codec::Document::is_reserved(&name));
        }

        #[test]
        fn contact_names_are_distinct(names in contact_names_strategy(8)) {
            let unique: std::collections::BTreeSet<_> = names.iter().collect();
            prop_assert_eq!(unique.len(), names.len());
        }
    }
}
