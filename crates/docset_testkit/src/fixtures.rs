//! Test fixtures and context helpers.
//!
//! Provides a small set of dbset declarations covering each key strategy
//! and split mode, plus a context over an in-memory server.

use docset_codec::Value;
use docset_core::{ContextConfig, DataContext, DbSetConfig, Entity, KeyStrategy, SplitConfig};
use docset_store::{MemoryServer, StoreProvider};
use std::path::PathBuf;
use tempfile::TempDir;

/// Name of the primary store opened by [`TestContext`].
pub const PRIMARY: &str = "app";

/// Contacts: composite key over first and last name.
pub const CONTACTS: &str = "Contacts";

/// Notes: managed split documents.
pub const NOTES: &str = "Notes";

/// Attachments: unmanaged split documents in [`SHARED_ATTACHMENTS`].
pub const ATTACHMENTS: &str = "Attachments";

/// Settings: constant key.
pub const SETTINGS: &str = "Settings";

/// Secondary store shared by every attachment.
pub const SHARED_ATTACHMENTS: &str = "shared_attachments";

/// Contacts keyed `Contacts/<firstName>/<lastName>`.
pub fn contacts_dbset() -> DbSetConfig {
    DbSetConfig::new(CONTACTS).key(KeyStrategy::composite_fields(["firstName", "lastName"]))
}

/// Notes whose `reference` field lives in a per-save secondary store.
pub fn notes_dbset() -> DbSetConfig {
    DbSetConfig::new(NOTES).split(SplitConfig::managed())
}

/// Attachments whose `reference` field lives in [`SHARED_ATTACHMENTS`].
pub fn attachments_dbset() -> DbSetConfig {
    DbSetConfig::new(ATTACHMENTS).split(SplitConfig::unmanaged(SHARED_ATTACHMENTS))
}

/// A single settings document keyed `Settings/current`.
pub fn settings_dbset() -> DbSetConfig {
    DbSetConfig::new(SETTINGS).key(KeyStrategy::Constant("current".to_string()))
}

/// Every fixture dbset.
pub fn standard_dbsets() -> Vec<DbSetConfig> {
    vec![
        contacts_dbset(),
        notes_dbset(),
        attachments_dbset(),
        settings_dbset(),
    ]
}

/// An unsaved contact.
pub fn contact(first: &str, last: &str) -> Entity {
    Entity::new(CONTACTS).with_fields(serde_json::json!({
        "firstName": first,
        "lastName": last,
        "phone": "555-0100",
    }))
}

/// An unsaved note with a managed reference.
pub fn note(title: &str, contents: &str) -> Entity {
    Entity::new(NOTES)
        .with_field("title", title)
        .with_field("reference", Value::map([("contents", contents)]))
}

/// An unsaved attachment pointing at an existing shared document.
pub fn attachment(name: &str, reference_id: &str, payload: &str) -> Entity {
    Entity::new(ATTACHMENTS)
        .with_field("name", name)
        .with_field(
            "reference",
            Value::map([("_id", reference_id), ("payload", payload)]),
        )
}

/// A data context with automatic cleanup.
///
/// Derefs to the [`DataContext`]. The server handle is kept so tests can
/// inspect stores directly and reopen the context over the same data.
pub struct TestContext<P: StoreProvider + Clone = MemoryServer> {
    /// The server the context was opened on.
    pub server: P,
    /// The context.
    pub ctx: DataContext<P>,
    config: ContextConfig,
    /// Holds the catalog file (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestContext<MemoryServer> {
    /// Opens the standard dbsets over a fresh in-memory server.
    pub async fn open() -> Self {
        Self::with_config(ContextConfig::default()).await
    }

    /// Opens the standard dbsets with `config`.
    pub async fn with_config(config: ContextConfig) -> Self {
        Self::over(MemoryServer::new(), config).await
    }

    /// Opens the standard dbsets with a catalog persisted in a temporary
    /// directory.
    pub async fn persistent(config: ContextConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = config.catalog_path(temp_dir.path().join("catalog.cbor"));
        let mut test = Self::over(MemoryServer::new(), config).await;
        test._temp_dir = Some(temp_dir);
        test
    }
}

impl<P: StoreProvider + Clone> TestContext<P> {
    /// Opens the standard dbsets over `server`.
    pub async fn over(server: P, config: ContextConfig) -> Self {
        let ctx = DataContext::open(server.clone(), PRIMARY, config.clone(), standard_dbsets())
            .await
            .expect("Failed to open data context");
        Self {
            server,
            ctx,
            config,
            _temp_dir: None,
        }
    }

    /// Drops the context and opens a fresh one over the same server,
    /// catalog and configuration.
    pub async fn reopen(self) -> Self {
        let Self {
            server,
            ctx,
            config,
            _temp_dir,
        } = self;
        drop(ctx);
        let ctx = DataContext::open(server.clone(), PRIMARY, config.clone(), standard_dbsets())
            .await
            .expect("Failed to reopen data context");
        Self {
            server,
            ctx,
            config,
            _temp_dir,
        }
    }

    /// Returns the catalog file path if persistent.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.config.catalog_path.clone()
    }
}

impl<P: StoreProvider + Clone> std::ops::Deref for TestContext<P> {
    type Target = DataContext<P>;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}
