//! Property tests over the public surface.

use docset_codec::{Document, Value};
use docset_core::{ContextConfig, Entity, ReferenceLocator};
use docset_testkit::prelude::*;
use proptest::prelude::*;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn locators_round_trip(
        name in database_name_strategy(),
        property in property_name_strategy(),
        value in locator_value_strategy(),
    ) {
        let locator = ReferenceLocator::new(name, property, value);
        prop_assert_eq!(ReferenceLocator::decode(&locator.encode()), Some(locator));
    }

    #[test]
    fn setting_back_leaves_entity_clean(
        fields in field_map_strategy(),
        name in field_name_strategy(),
        replacement in field_value_strategy(),
    ) {
        let mut doc = Document::new("T/1", "T").with_rev("1-a");
        doc.fields = fields;
        let original = doc.fields.get(&name).cloned();
        let mut entity = Entity::from_document(doc);

        entity.set(name.clone(), replacement);
        entity.set(name.clone(), Value::Integer(7));
        match original.clone() {
            Some(value) => entity.set(name.clone(), value),
            None => { entity.unset(&name); }
        }
        prop_assert!(!entity.is_dirty());
        let pristine = entity.pristine().and_then(|p| p.get(&name)).cloned();
        prop_assert_eq!(pristine.unwrap_or(Value::Null), original.unwrap_or(Value::Null));
    }

    #[test]
    fn composite_ids_follow_field_values(names in contact_names_strategy(6)) {
        block_on(async {
            let ctx = TestContext::with_config(ContextConfig::default()).await;
            let contacts = ctx.dbset(CONTACTS).unwrap();
            for (first, last) in &names {
                let entity = contacts.add(contact(first, last)).unwrap();
                assert_eq!(entity.id(), Some(format!("Contacts/{first}/{last}")));
            }
            assert_eq!(ctx.save_changes().await.unwrap(), names.len());
            assert_eq!(contacts.all().await.unwrap().len(), names.len());
        });
    }

    #[test]
    fn saved_fields_read_back_unchanged(fields in field_map_strategy()) {
        block_on(async {
            let ctx = TestContext::open().await;
            let settings = ctx.dbset(SETTINGS).unwrap();
            settings
                .add(settings.create().with_fields(Value::Map(fields.clone())))
                .unwrap();
            ctx.save_changes().await.unwrap();

            let ctx = ctx.reopen().await;
            let stored = ctx.dbset(SETTINGS).unwrap().all().await.unwrap();
            assert_eq!(stored.len(), 1);
            let read = stored[0].snapshot();
            for (name, value) in &fields {
                let got = read.get(name).unwrap();
                assert!(got.loosely_equals(value), "{name}: {got:?} != {value:?}");
            }
        });
    }
}
