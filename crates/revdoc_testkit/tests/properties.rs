//! Property tests for save/load round trips.

use proptest::prelude::*;
use revdoc_core::{Doctype, Document};
use revdoc_testkit::prelude::*;

fn schema_and_document() -> impl Strategy<Value = (Doctype, Document)> {
    schema_strategy(6).prop_flat_map(|schema| {
        let doctype = schema.build();
        let document = document_strategy(&doctype);
        (Just(doctype), document)
    })
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn doctypes_round_trip(schema in schema_strategy(8)) {
        let store = TestStore::memory();
        let mut doctype = schema.build();
        store.save_doctype(&mut doctype).unwrap();

        let loaded = store.load_doctype(doctype.id.as_deref().unwrap()).unwrap();
        prop_assert_eq!(&loaded, &doctype);
        let by_code = store.load_doctype_by_code(&doctype.code).unwrap();
        prop_assert_eq!(by_code, loaded);
    }

    #[test]
    fn documents_round_trip((doctype, document) in schema_and_document()) {
        let store = TestStore::memory();
        let mut doctype = doctype;
        store.save_doctype(&mut doctype).unwrap();

        let mut document = document;
        store.save_document(&mut document).unwrap();

        let loaded = store.load_document(document.id.as_deref().unwrap()).unwrap();
        prop_assert_eq!(&loaded, &document);
        let by_slug = store.load_document_by_slug(&document.slug).unwrap();
        prop_assert_eq!(by_slug, loaded);
    }

    #[test]
    fn string_values_survive_updates(
        first in string_value_strategy(),
        second in string_value_strategy(),
    ) {
        let store = TestStore::memory();
        scenarios::page_doctype(&store);

        let mut doc = Document::new("subject", "page");
        doc.set("title", first.clone());
        store.save_document(&mut doc).unwrap();
        let first_revision = doc.revision.clone().unwrap();

        doc.set("title", second.clone());
        store.save_document(&mut doc).unwrap();

        let current = store.load_document_by_slug("subject").unwrap();
        prop_assert_eq!(current.get("title").and_then(|v| v.as_str()), Some(second.as_str()));
        let past = store.documents().load_at_revision(&first_revision.id).unwrap();
        prop_assert_eq!(past.get("title").and_then(|v| v.as_str()), Some(first.as_str()));
    }
}
