//! Garbage collection of orphaned secondary stores.

use super::DataContext;
use crate::error::CoreResult;
use crate::reference::ReferenceLocator;
use docset_store::{DocumentStore, FindRequest, Selector, StoreProvider};
use std::collections::BTreeSet;

/// Outcome of [`DataContext::cleanup_orphans`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Secondary stores destroyed.
    pub destroyed: Vec<String>,
    /// Secondary stores still referenced, or that could not be checked or
    /// destroyed.
    pub kept: Vec<String>,
}

impl<P: StoreProvider> DataContext<P> {
    /// Destroys catalogued secondary stores that no primary document
    /// references.
    ///
    /// A store is an orphan if it is empty or no primary document's locator
    /// field points into it. A context without split dbsets cannot tell, so
    /// it keeps every non-empty store. Cleanup never fails: a store that
    /// cannot be counted, queried for or destroyed is logged and stays
    /// catalogued for the next run.
    pub async fn cleanup_orphans(&self) -> CleanupReport {
        let locator_fields: BTreeSet<&str> = self
            .dbsets
            .values()
            .filter_map(|def| def.split())
            .map(|split| split.locator_field.as_str())
            .collect();

        let mut report = CleanupReport::default();
        for name in self.catalog.names() {
            let store = match self.provider.open(&name) {
                Ok(store) => store,
                Err(e) => {
                    tracing::warn!(database = %name, error = %e, "cannot open secondary database");
                    report.kept.push(name);
                    continue;
                }
            };

            let orphaned = match store.doc_count().await {
                Ok(0) => true,
                Ok(_) => match self.is_referenced(&name, &locator_fields).await {
                    Ok(referenced) => !referenced,
                    Err(e) => {
                        tracing::warn!(database = %name, error = %e, "cannot look up references");
                        false
                    }
                },
                Err(e) => {
                    tracing::warn!(database = %name, error = %e, "cannot count secondary database");
                    false
                }
            };

            if orphaned && self.destroy_secondary(&store).await {
                report.destroyed.push(name);
            } else {
                report.kept.push(name);
            }
        }

        if !report.destroyed.is_empty() {
            tracing::info!(
                destroyed = report.destroyed.len(),
                kept = report.kept.len(),
                "cleaned up orphaned secondary databases"
            );
        }
        report
    }

    async fn is_referenced(&self, database_name: &str, locator_fields: &BTreeSet<&str>) -> CoreResult<bool> {
        if locator_fields.is_empty() {
            return Ok(true);
        }
        let prefix = ReferenceLocator::store_prefix(database_name);
        let selector = Selector::Or(
            locator_fields
                .iter()
                .map(|field| Selector::starts_with(*field, prefix.as_str()))
                .collect(),
        );
        let request = FindRequest::new(selector).with_limit(1);
        Ok(!self.store.find(request).await?.is_empty())
    }

    /// Destroys a secondary store and forgets it, returning true on success.
    ///
    /// On failure the name stays catalogued.
    pub(crate) async fn destroy_secondary(&self, store: &P::Store) -> bool {
        match store.destroy().await {
            Ok(()) => {
                self.catalog.remove(store.name());
                tracing::debug!(database = store.name(), "destroyed secondary database");
                true
            }
            Err(e) => {
                tracing::warn!(database = store.name(), error = %e, "failed to destroy secondary database");
                self.catalog.add(store.name());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{DbSetConfig, SplitConfig};
    use crate::config::ContextConfig;
    use docset_codec::Document;
    use docset_store::MemoryServer;

    #[tokio::test]
    async fn destroys_empty_and_unreferenced_stores() {
        let server = MemoryServer::new();
        let ctx = DataContext::open(
            server.clone(),
            "app",
            ContextConfig::default().cleanup_on_open(false),
            [DbSetConfig::new("Notes").split(SplitConfig::managed())],
        )
        .await
        .unwrap();

        let empty = server.open("Notes_empty_REFERENCE_db").unwrap();
        let orphan = server.open("Notes_orphan_REFERENCE_db").unwrap();
        let live = server.open("Notes_live_REFERENCE_db").unwrap();
        for store in [&orphan, &live] {
            store
                .bulk_write(vec![Document::new("r1", "Notes_reference")])
                .await
                .unwrap();
        }
        let locator = ReferenceLocator::for_id("Notes_live_REFERENCE_db", "r1").encode();
        ctx.store()
            .bulk_write(vec![Document::new("n1", "Notes").with_field("referencePath", locator)])
            .await
            .unwrap();
        for store in [&empty, &orphan, &live] {
            ctx.catalog().add(store.name());
        }

        let report = ctx.cleanup_orphans().await;
        assert_eq!(
            report.destroyed,
            vec!["Notes_empty_REFERENCE_db", "Notes_orphan_REFERENCE_db"]
        );
        assert_eq!(report.kept, vec!["Notes_live_REFERENCE_db"]);
        assert_eq!(ctx.catalog().names(), vec!["Notes_live_REFERENCE_db"]);
        assert!(server.exists("Notes_live_REFERENCE_db"));
        assert!(!server.exists("Notes_orphan_REFERENCE_db"));
        assert!(!server.exists("Notes_empty_REFERENCE_db"));
    }

    #[tokio::test]
    async fn empty_catalog_is_a_no_op() {
        let ctx = DataContext::open(
            MemoryServer::new(),
            "app",
            ContextConfig::default(),
            [DbSetConfig::new("Contacts")],
        )
        .await
        .unwrap();
        assert_eq!(ctx.cleanup_orphans().await, CleanupReport::default());
    }
}
