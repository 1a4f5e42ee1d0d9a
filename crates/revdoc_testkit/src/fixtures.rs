//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common test scenarios.

use revdoc_core::{Config, DocStore};
use revdoc_storage::InMemoryStore;
use std::sync::Arc;

/// A document store over a fresh in-memory backend.
pub struct TestStore {
    /// The document store.
    pub store: DocStore,
    /// The backend, kept for direct inspection.
    pub backend: Arc<InMemoryStore>,
}

impl TestStore {
    /// Creates a store with the default configuration.
    pub fn memory() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a store with `config`.
    pub fn with_config(config: Config) -> Self {
        crate::init_test_logging();
        let backend = Arc::new(InMemoryStore::new());
        let store = DocStore::open_with_config(backend.clone(), config)
            .expect("Failed to open in-memory document store");
        Self { store, backend }
    }
}

impl std::ops::Deref for TestStore {
    type Target = DocStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory document store.
///
/// # Example
///
/// ```rust
/// use revdoc_testkit::with_temp_store;
///
/// with_temp_store(|store| {
///     assert!(store.load_document("0000").is_err());
/// });
/// ```
pub fn with_temp_store<F, R>(f: F) -> R
where
    F: FnOnce(&DocStore) -> R,
{
    let test_store = TestStore::memory();
    f(&test_store.store)
}

/// Test scenario helpers.
pub mod scenarios {
    use revdoc_core::{DocStore, Doctype, DoctypeBuilder, Document};
    use serde_json::json;

    /// The `page` schema used throughout the tests.
    pub fn page_schema() -> DoctypeBuilder {
        DoctypeBuilder::new("page", "Pagina")
            .field("title", "Titulo", "string")
            .field("body", "Texto", "string")
            .multi_field("tags", "Tags", "string")
    }

    /// Saves the `page` doctype and returns it.
    pub fn page_doctype(store: &DocStore) -> Doctype {
        let mut page = page_schema().build();
        store.save_doctype(&mut page).expect("Failed to save page doctype");
        page
    }

    /// Builds an unsaved page document.
    pub fn page_document(slug: &str, title: &str) -> Document {
        let mut doc = Document::new(slug, "page");
        doc.set("title", title);
        doc.set("body", format!("Body of {title}"));
        doc.set("tags", json!(["test"]));
        doc
    }

    /// Saves the page doctype and `count` page documents.
    pub fn populated_store(store: &DocStore, count: usize) -> Vec<Document> {
        page_doctype(store);
        (0..count)
            .map(|i| {
                let mut doc = page_document(&format!("page-{i}"), &format!("Page {i}"));
                store.save_document(&mut doc).expect("Failed to save document");
                doc
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let test_store = TestStore::memory();
        assert!(test_store.backend.is_empty());
    }

    #[test]
    fn test_with_temp_store() {
        with_temp_store(|store| {
            let page = scenarios::page_doctype(store);
            assert!(page.id.is_some());
        });
    }

    #[test]
    fn test_populated_scenario() {
        let test_store = TestStore::memory();
        let docs = scenarios::populated_store(&test_store, 5);
        assert_eq!(docs.len(), 5);
        assert!(test_store.load_document_by_slug("page-4").is_ok());
    }
}
