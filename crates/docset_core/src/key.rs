//! Key derivation.

use crate::entity::Entity;
use crate::error::CoreResult;
use docset_codec::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A pure function computing one composite-key component.
pub type KeySelector = Arc<dyn Fn(&Entity) -> CoreResult<Value> + Send + Sync>;

/// One component of a composite key.
#[derive(Clone)]
pub enum KeyComponent {
    /// The value of a field; a missing field renders as an empty string.
    Field(String),
    /// The result of a selector over the whole entity.
    Selector(KeySelector),
}

impl KeyComponent {
    /// Creates a field component.
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Creates a selector component.
    pub fn selector<F>(f: F) -> Self
    where
        F: Fn(&Entity) -> CoreResult<Value> + Send + Sync + 'static,
    {
        Self::Selector(Arc::new(f))
    }

    fn render(&self, entity: &Entity) -> CoreResult<String> {
        match self {
            KeyComponent::Field(name) => Ok(entity
                .get(name)
                .filter(|value| !value.is_null())
                .map(Value::to_string)
                .unwrap_or_default()),
            KeyComponent::Selector(selector) => {
                let value = selector(entity)?;
                Ok(if value.is_null() {
                    String::new()
                } else {
                    value.to_string()
                })
            }
        }
    }
}

impl fmt::Debug for KeyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyComponent::Field(name) => f.debug_tuple("Field").field(name).finish(),
            KeyComponent::Selector(_) => f.write_str("Selector(..)"),
        }
    }
}

/// How a dbset computes the id of a new entity.
#[derive(Debug, Clone, Default)]
pub enum KeyStrategy {
    /// A fresh UUID per entity.
    #[default]
    RandomUnique,
    /// `<document type>/<suffix>`: every entity of the type shares one id.
    Constant(String),
    /// `<document type>/<component>/<component>/...`.
    Composite(Vec<KeyComponent>),
}

impl KeyStrategy {
    /// Composite key over the named fields, in order.
    pub fn composite_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Composite(fields.into_iter().map(KeyComponent::field).collect())
    }

    /// Derives the id for `entity`.
    ///
    /// # Errors
    ///
    /// A failing selector's error is returned unchanged.
    pub fn derive(&self, document_type: &str, entity: &Entity) -> CoreResult<String> {
        match self {
            KeyStrategy::RandomUnique => Ok(Uuid::new_v4().to_string()),
            KeyStrategy::Constant(suffix) => Ok(format!("{document_type}/{suffix}")),
            KeyStrategy::Composite(components) => {
                let mut id = String::from(document_type);
                for component in components {
                    id.push('/');
                    id.push_str(&component.render(entity)?);
                }
                Ok(id)
            }
        }
    }
}
