//! Per-read index selection.

use parking_lot::Mutex;

/// Chooses the index hint for each read of a dbset.
///
/// [`IndexSelector::get`] consumes a one-shot override if one was set with
/// [`IndexSelector::use_index`], and otherwise falls back to the default.
#[derive(Debug, Default)]
pub struct IndexSelector {
    default: Option<String>,
    one_shot: Mutex<Option<String>>,
}

impl IndexSelector {
    /// Creates a selector with an optional default index.
    pub fn new(default: Option<String>) -> Self {
        Self {
            default,
            one_shot: Mutex::new(None),
        }
    }

    /// Uses `name` for the next read only.
    pub fn use_index(&self, name: impl Into<String>) {
        *self.one_shot.lock() = Some(name.into());
    }

    /// Returns the index for this read, clearing any one-shot override.
    pub fn get(&self) -> Option<String> {
        self.one_shot.lock().take().or_else(|| self.default.clone())
    }

    /// Returns the configured default.
    pub fn default_index(&self) -> Option<&str> {
        self.default.as_deref()
    }
}
