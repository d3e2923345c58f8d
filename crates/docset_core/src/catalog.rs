//! Catalog of secondary databases.

use crate::error::CoreResult;
use docset_codec::{from_cbor, to_cbor, CodecError, Value};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Names of the secondary databases created for split documents.
///
/// Orphan cleanup walks this list, so it must outlive the process when
/// secondary stores do. With a path the catalog is persisted as a CBOR
/// array of names after every change. Persistence is best-effort: a failed
/// write is logged and the in-memory list stays authoritative.
#[derive(Debug)]
pub struct DatabaseCatalog {
    path: Option<PathBuf>,
    names: Mutex<BTreeSet<String>>,
}

impl DatabaseCatalog {
    /// Creates a catalog that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            names: Mutex::new(BTreeSet::new()),
        }
    }

    /// Opens a persisted catalog, starting empty if the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let names = match Self::load(&path) {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "discarding unreadable database catalog");
                BTreeSet::new()
            }
        };
        Self {
            path: Some(path),
            names: Mutex::new(names),
        }
    }

    fn load(path: &Path) -> CoreResult<BTreeSet<String>> {
        if !path.exists() {
            return Ok(BTreeSet::new());
        }
        let bytes = fs::read(path)?;
        let Value::Array(items) = from_cbor(&bytes)? else {
            return Err(CodecError::invalid_document("catalog must be an array of names").into());
        };
        Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Text(name) => Some(name),
                _ => None,
            })
            .collect())
    }

    /// Returns the catalogued names in order.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().iter().cloned().collect()
    }

    /// Returns true if `name` is catalogued.
    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    /// Returns the number of catalogued names.
    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    /// Returns true if nothing is catalogued.
    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }

    /// Records a secondary database.
    pub fn add(&self, name: &str) {
        let mut names = self.names.lock();
        if names.insert(name.to_string()) {
            self.persist_best_effort(&names);
        }
    }

    /// Forgets a secondary database.
    pub fn remove(&self, name: &str) {
        let mut names = self.names.lock();
        if names.remove(name) {
            self.persist_best_effort(&names);
        }
    }

    /// Writes the catalog to its file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the file write fails. Does nothing
    /// for an in-memory catalog.
    pub fn flush(&self) -> CoreResult<()> {
        let names = self.names.lock();
        self.persist(&names)
    }

    fn persist(&self, names: &BTreeSet<String>) -> CoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let list = Value::Array(names.iter().cloned().map(Value::Text).collect());
        let bytes = to_cbor(&list)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn persist_best_effort(&self, names: &BTreeSet<String>) {
        if let Err(e) = self.persist(names) {
            tracing::warn!(error = %e, "failed to persist database catalog");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn in_memory_add_remove() {
        let catalog = DatabaseCatalog::in_memory();
        catalog.add("b");
        catalog.add("a");
        catalog.add("a");
        assert_eq!(catalog.names(), vec!["a", "b"]);
        catalog.remove("a");
        assert!(!catalog.contains("a"));
        assert_eq!(catalog.len(), 1);
        catalog.flush().unwrap();
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.cbor");
        {
            let catalog = DatabaseCatalog::open(&path);
            assert!(catalog.is_empty());
            catalog.add("Notes_1_REFERENCE_db");
            catalog.add("Notes_2_REFERENCE_db");
            catalog.remove("Notes_1_REFERENCE_db");
        }
        let reopened = DatabaseCatalog::open(&path);
        assert_eq!(reopened.names(), vec!["Notes_2_REFERENCE_db"]);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("catalog.cbor");
        fs::write(&path, b"\xff\x00garbage").unwrap();
        let catalog = DatabaseCatalog::open(&path);
        assert!(catalog.is_empty());
        catalog.add("x");
        assert_eq!(DatabaseCatalog::open(&path).names(), vec!["x"]);
    }
}
