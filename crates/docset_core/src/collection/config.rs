//! Per-dbset configuration.

use crate::index::IndexSelector;
use crate::key::KeyStrategy;

/// Default field holding the embedded reference of a split entity.
pub const DEFAULT_REFERENCE_FIELD: &str = "reference";

/// Default field holding the reference locator on the primary document.
pub const DEFAULT_LOCATOR_FIELD: &str = "referencePath";

/// Who owns the secondary documents of a split dbset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMode {
    /// References are written, versioned and deleted by the data context,
    /// in secondary databases it names and garbage-collects.
    Managed,
    /// References point at caller-owned documents in `database_name`; the
    /// data context only reads them.
    Unmanaged {
        /// Database holding the shared reference documents.
        database_name: String,
    },
}

/// Declares a dbset's entities as split documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitConfig {
    /// Ownership of the reference documents.
    pub mode: SplitMode,
    /// Entity field carrying the embedded reference map.
    pub reference_field: String,
    /// Primary-document field carrying the encoded reference locator.
    pub locator_field: String,
}

impl SplitConfig {
    /// Managed split with default field names.
    pub fn managed() -> Self {
        Self {
            mode: SplitMode::Managed,
            reference_field: DEFAULT_REFERENCE_FIELD.to_string(),
            locator_field: DEFAULT_LOCATOR_FIELD.to_string(),
        }
    }

    /// Unmanaged split reading references from `database_name`.
    pub fn unmanaged(database_name: impl Into<String>) -> Self {
        Self {
            mode: SplitMode::Unmanaged {
                database_name: database_name.into(),
            },
            ..Self::managed()
        }
    }

    /// Sets the reference field name.
    #[must_use]
    pub fn reference_field(mut self, name: impl Into<String>) -> Self {
        self.reference_field = name.into();
        self
    }

    /// Sets the locator field name.
    #[must_use]
    pub fn locator_field(mut self, name: impl Into<String>) -> Self {
        self.locator_field = name.into();
        self
    }

    /// Returns true for managed splits.
    pub fn is_managed(&self) -> bool {
        matches!(self.mode, SplitMode::Managed)
    }
}

/// Declaration of one dbset.
#[derive(Debug, Clone)]
pub struct DbSetConfig {
    /// Document type of every entity in the set.
    pub document_type: String,
    /// Id derivation for new entities.
    pub key: KeyStrategy,
    /// Index hint used by reads without a one-shot override.
    pub default_index: Option<String>,
    /// Split-document handling, if any.
    pub split: Option<SplitConfig>,
}

impl DbSetConfig {
    /// Declares a dbset with random ids, no default index and no split.
    pub fn new(document_type: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            key: KeyStrategy::default(),
            default_index: None,
            split: None,
        }
    }

    /// Sets the key strategy.
    #[must_use]
    pub fn key(mut self, key: KeyStrategy) -> Self {
        self.key = key;
        self
    }

    /// Sets the default index.
    #[must_use]
    pub fn default_index(mut self, name: impl Into<String>) -> Self {
        self.default_index = Some(name.into());
        self
    }

    /// Declares the set's entities as split documents.
    #[must_use]
    pub fn split(mut self, split: SplitConfig) -> Self {
        self.split = Some(split);
        self
    }
}

/// A registered dbset: its configuration plus per-set runtime state.
#[derive(Debug)]
pub(crate) struct DbSetDefinition {
    pub config: DbSetConfig,
    pub index: IndexSelector,
}

impl DbSetDefinition {
    pub fn new(config: DbSetConfig) -> Self {
        let index = IndexSelector::new(config.default_index.clone());
        Self { config, index }
    }

    pub fn document_type(&self) -> &str {
        &self.config.document_type
    }

    pub fn split(&self) -> Option<&SplitConfig> {
        self.config.split.as_ref()
    }
}
