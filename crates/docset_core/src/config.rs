//! Data context configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default suffix appended to secondary database names.
pub const DEFAULT_REFERENCE_SUFFIX: &str = "_REFERENCE_db";

/// Configuration for opening a [`crate::DataContext`].
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Suffix appended to every managed secondary database name.
    pub reference_suffix: String,

    /// How long a split-document correlation record stays valid.
    pub correlation_ttl: Duration,

    /// Where the database catalog is persisted (`None` keeps it in memory).
    pub catalog_path: Option<PathBuf>,

    /// Whether to run orphan cleanup when the context opens.
    pub cleanup_on_open: bool,

    /// Whether to run orphan cleanup after every successful save.
    pub cleanup_after_save: bool,

    /// Whether non-strict reads turn every store error (except a closed
    /// store) into an empty result.
    pub mask_query_errors: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            reference_suffix: DEFAULT_REFERENCE_SUFFIX.to_string(),
            correlation_ttl: Duration::from_secs(60),
            catalog_path: None,
            cleanup_on_open: true,
            cleanup_after_save: false,
            mask_query_errors: false,
        }
    }
}

impl ContextConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the secondary database name suffix.
    #[must_use]
    pub fn reference_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.reference_suffix = suffix.into();
        self
    }

    /// Sets the correlation record lifetime.
    #[must_use]
    pub const fn correlation_ttl(mut self, ttl: Duration) -> Self {
        self.correlation_ttl = ttl;
        self
    }

    /// Persists the database catalog at `path`.
    #[must_use]
    pub fn catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = Some(path.into());
        self
    }

    /// Sets whether orphan cleanup runs on open.
    #[must_use]
    pub const fn cleanup_on_open(mut self, value: bool) -> Self {
        self.cleanup_on_open = value;
        self
    }

    /// Sets whether orphan cleanup runs after each save.
    #[must_use]
    pub const fn cleanup_after_save(mut self, value: bool) -> Self {
        self.cleanup_after_save = value;
        self
    }

    /// Sets whether non-strict reads mask store errors.
    #[must_use]
    pub const fn mask_query_errors(mut self, value: bool) -> Self {
        self.mask_query_errors = value;
        self
    }
}
