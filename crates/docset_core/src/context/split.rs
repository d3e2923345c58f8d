//! Split documents: an entity persisted as a primary document plus a
//! reference document in a secondary store.
//!
//! The reference travels in memory as a map under the dbset's reference
//! field. On the wire the primary document carries only a
//! [`ReferenceLocator`] under the locator field.
//!
//! Managed references live in secondary stores named
//! `<document type>_<transaction id><suffix>`. Every managed add of a
//! document type within one save cycle shares one transaction id and so
//! one store. After a save that deleted references, a store left empty is
//! destroyed and dropped from the catalog.

use super::save::SaveOutcome;
use super::{text_field, DataContext};
use crate::collection::{SplitConfig, SplitMode};
use crate::entity::{Entity, EntityRef};
use crate::error::{CoreError, CoreResult};
use crate::reference::ReferenceLocator;
use docset_codec::{
    Document, Value, DELETED_FIELD, DOCUMENT_TYPE_FIELD, ID_FIELD, REV_FIELD,
};
use docset_store::{
    DocumentStore, FetchResult, FindRequest, Selector, StoreProvider, StoreResult, WriteResult,
};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Secondary writes prepared before a save.
#[derive(Debug, Default)]
pub(crate) struct SplitPlan {
    groups: BTreeMap<String, ReferenceGroup>,
}

impl SplitPlan {
    fn group(&mut self, database_name: &str) -> &mut ReferenceGroup {
        self.groups.entry(database_name.to_string()).or_default()
    }
}

/// Reference documents bound for one secondary store.
#[derive(Debug, Default)]
struct ReferenceGroup {
    writes: Vec<ReferenceWrite>,
    has_deletions: bool,
}

#[derive(Debug)]
struct ReferenceWrite {
    primary: EntityRef,
    doc: Document,
    /// Field to splice the new `_rev` into; `None` for deletions.
    splice_into: Option<String>,
}

/// Name of a managed secondary store.
pub(crate) fn secondary_database_name(
    document_type: &str,
    transaction_id: &str,
    suffix: &str,
) -> String {
    format!("{document_type}_{transaction_id}{suffix}")
}

/// Document type of the reference documents of `document_type`.
pub(crate) fn reference_document_type(document_type: &str) -> String {
    format!("{document_type}_reference")
}

impl<P: StoreProvider> DataContext<P> {
    /// Validates a split entity being added and stamps its locator.
    ///
    /// Managed references must not carry `_id`, `_rev` or `DocumentType`;
    /// they receive a fresh `_id` and a locator into the store of the
    /// document type's active transaction. Unmanaged references must carry
    /// the `_id` of an existing document in the configured database.
    pub(crate) fn prepare_split_add(&self, split: &SplitConfig, entity: &mut Entity) -> CoreResult<()> {
        let primary_id = entity.id().unwrap_or_default().to_string();
        let Some(mut reference) = entity
            .get(&split.reference_field)
            .and_then(Value::as_map)
            .cloned()
        else {
            return Err(CoreError::validation(format!(
                "split entity {primary_id} has no reference map in field {}",
                split.reference_field
            )));
        };

        let locator = match &split.mode {
            SplitMode::Managed => {
                if [ID_FIELD, REV_FIELD, DOCUMENT_TYPE_FIELD]
                    .iter()
                    .any(|field| reference.contains_key(*field))
                {
                    return Err(CoreError::ReservedReferenceFields { id: primary_id });
                }
                let document_type = entity.document_type().to_string();
                let transaction_id = self.transactions().acquire(&document_type);
                let database_name = secondary_database_name(
                    &document_type,
                    &transaction_id,
                    &self.config().reference_suffix,
                );
                let reference_id = Uuid::new_v4().to_string();
                reference.insert(ID_FIELD.to_string(), Value::Text(reference_id.clone()));
                reference.insert(
                    DOCUMENT_TYPE_FIELD.to_string(),
                    Value::Text(reference_document_type(&document_type)),
                );
                entity.put_untracked(split.reference_field.clone(), Value::Map(reference));
                ReferenceLocator::for_id(database_name, reference_id)
            }
            SplitMode::Unmanaged { database_name } => {
                let Some(reference_id) = reference.get(ID_FIELD).and_then(Value::as_text) else {
                    return Err(CoreError::validation(format!(
                        "unmanaged reference of {primary_id} must carry the _id of an existing document"
                    )));
                };
                ReferenceLocator::for_id(database_name.clone(), reference_id)
            }
        };

        entity.put_untracked(split.locator_field.clone(), Value::Text(locator.encode()));
        Ok(())
    }

    /// Collects the secondary writes of a save.
    ///
    /// Additions always write their reference; updates only when the
    /// reference field itself changed; removals delete the reference
    /// document the locator points at. Unmanaged references are never
    /// written.
    pub(crate) async fn prepare_split(
        &self,
        removed: &[EntityRef],
        added: &[EntityRef],
        updated: &[EntityRef],
    ) -> CoreResult<SplitPlan> {
        let mut plan = SplitPlan::default();

        for entity in added {
            if let Some(split) = self.managed_split(entity) {
                self.plan_reference_write(&mut plan, entity, split);
            }
        }
        for entity in updated {
            let Some(split) = self.managed_split(entity) else {
                continue;
            };
            let changed = entity
                .read()
                .pristine()
                .is_some_and(|pristine| pristine.contains_key(&split.reference_field));
            if changed {
                self.plan_reference_write(&mut plan, entity, split);
            }
        }
        for entity in removed {
            if let Some(split) = self.managed_split(entity) {
                self.plan_reference_deletion(&mut plan, entity, split).await;
            }
        }

        tracing::debug!(groups = plan.groups.len(), "prepared split references");
        Ok(plan)
    }

    fn managed_split(&self, entity: &EntityRef) -> Option<&SplitConfig> {
        let document_type = entity.document_type();
        self.definition(&document_type)?
            .split()
            .filter(|split| split.is_managed())
    }

    fn plan_reference_write(&self, plan: &mut SplitPlan, entity: &EntityRef, split: &SplitConfig) {
        let guard = entity.read();
        let Some(locator) = text_field(&guard, &split.locator_field).and_then(ReferenceLocator::decode)
        else {
            tracing::warn!(id = ?guard.id(), "split entity has no valid locator; reference not written");
            return;
        };
        let Some(reference) = guard.get(&split.reference_field).and_then(Value::as_map) else {
            tracing::warn!(id = ?guard.id(), "split entity has no reference; nothing to write");
            return;
        };
        let previous = guard
            .pristine()
            .and_then(|pristine| pristine.get(&split.reference_field))
            .and_then(Value::as_map);
        let doc = reference_document(reference, previous, &locator, guard.document_type());
        drop(guard);

        plan.group(&locator.database_name).writes.push(ReferenceWrite {
            primary: entity.clone(),
            doc,
            splice_into: Some(split.reference_field.clone()),
        });
    }

    async fn plan_reference_deletion(
        &self,
        plan: &mut SplitPlan,
        entity: &EntityRef,
        split: &SplitConfig,
    ) {
        let locator = {
            let guard = entity.read();
            text_field(&guard, &split.locator_field).and_then(ReferenceLocator::decode)
        };
        let Some(locator) = locator else {
            tracing::debug!(id = ?entity.id(), "removed split entity has no locator");
            return;
        };

        let found = match self.provider().open(&locator.database_name) {
            Ok(store) => lookup_reference(&store, &locator).await,
            Err(e) => Err(e),
        };
        let group = plan.group(&locator.database_name);
        group.has_deletions = true;
        match found {
            Ok(Some(doc)) => group.writes.push(ReferenceWrite {
                primary: entity.clone(),
                doc: doc.to_deletion_stub(),
                splice_into: None,
            }),
            Ok(None) => {
                tracing::debug!(locator = %locator, "reference already gone");
            }
            Err(e) => {
                tracing::warn!(locator = %locator, error = %e, "cannot load reference for deletion");
            }
        }
    }

    /// Writes the planned references of every primary write that
    /// succeeded, one secondary store at a time.
    ///
    /// Each group is independent: a store that cannot be opened or written
    /// is logged and stays in the catalog, and the remaining groups are
    /// still written.
    pub(crate) async fn finish_split(&self, plan: SplitPlan, outcome: &SaveOutcome) {
        for (database_name, group) in plan.groups {
            if let Err(e) = self.write_reference_group(&database_name, group, outcome).await {
                tracing::warn!(database = %database_name, error = %e, "cannot write reference group");
                self.catalog().add(&database_name);
            }
        }
    }

    async fn write_reference_group(
        &self,
        database_name: &str,
        group: ReferenceGroup,
        outcome: &SaveOutcome,
    ) -> CoreResult<()> {
        let writes: Vec<ReferenceWrite> = group
            .writes
            .into_iter()
            .filter(|write| outcome.contains(&write.primary))
            .collect();
        if writes.is_empty() && !group.has_deletions {
            return Ok(());
        }

        let store = self.provider().open(database_name)?;
        if !writes.is_empty() {
            tracing::debug!(
                database = %database_name,
                documents = writes.len(),
                "writing reference group"
            );
            let docs = writes.iter().map(|write| write.doc.clone()).collect();
            let results = store.bulk_write(docs).await?;
            for (write, result) in writes.iter().zip(results) {
                match result {
                    WriteResult::Written { id, rev } => {
                        if let Some(field) = &write.splice_into {
                            splice_revision(&write.primary, field, id, rev);
                        }
                    }
                    WriteResult::Rejected { id, reason } => {
                        tracing::warn!(database = %database_name, %id, %reason, "reference write rejected");
                    }
                }
            }
        }

        if !group.has_deletions {
            self.catalog().add(database_name);
            return Ok(());
        }
        match store.doc_count().await {
            Ok(0) => {
                self.destroy_secondary(&store).await;
            }
            Ok(_) => self.catalog().add(database_name),
            Err(e) => {
                tracing::warn!(database = %database_name, error = %e, "cannot count secondary database");
                self.catalog().add(database_name);
            }
        }
        Ok(())
    }

    /// Embeds each document's reference, read from its secondary store.
    ///
    /// A locator that does not decode, or a reference that cannot be
    /// loaded, leaves the reference field absent.
    pub(crate) async fn splice_references(&self, split: &SplitConfig, docs: &mut [Document]) {
        let mut wanted: BTreeMap<String, Vec<(usize, ReferenceLocator)>> = BTreeMap::new();
        for (position, doc) in docs.iter().enumerate() {
            let locator = doc
                .fields
                .get(&split.locator_field)
                .and_then(Value::as_text)
                .and_then(ReferenceLocator::decode);
            if let Some(locator) = locator {
                wanted
                    .entry(locator.database_name.clone())
                    .or_default()
                    .push((position, locator));
            }
        }

        for (database_name, entries) in wanted {
            let store = match self.provider().open(&database_name) {
                Ok(store) => store,
                Err(e) => {
                    tracing::warn!(database = %database_name, error = %e, "cannot open secondary database");
                    continue;
                }
            };
            for (position, locator) in entries {
                match lookup_reference(&store, &locator).await {
                    Ok(Some(reference)) => {
                        docs[position]
                            .fields
                            .insert(split.reference_field.clone(), reference.to_value());
                    }
                    Ok(None) => {
                        tracing::warn!(locator = %locator, "dangling reference locator");
                    }
                    Err(e) => {
                        tracing::warn!(locator = %locator, error = %e, "cannot load reference");
                    }
                }
            }
        }
    }
}

async fn lookup_reference<S: DocumentStore>(
    store: &S,
    locator: &ReferenceLocator,
) -> StoreResult<Option<Document>> {
    if locator.selects_id() {
        let mut results = store.bulk_get(std::slice::from_ref(&locator.value)).await?;
        Ok(results.pop().and_then(FetchResult::into_document))
    } else {
        let selector = Selector::eq(locator.property.as_str(), locator.value.as_str());
        let request = FindRequest::new(selector).with_limit(1);
        Ok(store.find(request).await?.into_iter().next())
    }
}

/// Builds the secondary document from an in-memory reference map.
///
/// `_id` and `_rev` missing from a replaced reference fall back to the
/// reference's pre-change value, then (for the id) to the locator.
fn reference_document(
    reference: &BTreeMap<String, Value>,
    previous: Option<&BTreeMap<String, Value>>,
    locator: &ReferenceLocator,
    document_type: &str,
) -> Document {
    let text = |field: &str| {
        reference
            .get(field)
            .or_else(|| previous.and_then(|p| p.get(field)))
            .and_then(Value::as_text)
            .map(str::to_owned)
    };
    let mut fields = reference.clone();
    for field in [ID_FIELD, REV_FIELD, DOCUMENT_TYPE_FIELD, DELETED_FIELD] {
        fields.remove(field);
    }
    Document {
        id: text(ID_FIELD).unwrap_or_else(|| locator.value.clone()),
        rev: text(REV_FIELD),
        document_type: text(DOCUMENT_TYPE_FIELD)
            .unwrap_or_else(|| reference_document_type(document_type)),
        deleted: false,
        fields,
    }
}

fn splice_revision(primary: &EntityRef, field: &str, id: String, rev: String) {
    let mut entity = primary.write();
    let Some(mut reference) = entity.get(field).cloned() else {
        return;
    };
    if let Some(map) = reference.as_map_mut() {
        map.insert(ID_FIELD.to_string(), Value::Text(id));
        map.insert(REV_FIELD.to_string(), Value::Text(rev));
        entity.put_untracked(field, reference);
    }
}
