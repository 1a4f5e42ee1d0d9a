//! Document store facade.

use crate::batch::with_batch;
use crate::config::Config;
use crate::doctype::{Doctype, DoctypeStore};
use crate::document::{Document, DocumentStore};
use crate::error::{CoreError, CoreResult};
use crate::id::IdGenerator;
use crate::registry::DoctypeRegistry;
use crate::revision::{Revision, RevisionStore};
use crate::schema::SchemaBuilder;
use crate::types::EntityKind;
use revdoc_storage::KeyValueStore;
use std::sync::Arc;

/// The main store handle.
///
/// `DocStore` owns one handle to the backing key-value store, the identifier
/// generator and a [`DoctypeRegistry`]. Every `save_*` method queues its
/// writes into one batch and applies it in a single round trip; the entity
/// passed in is only updated once the batch has been applied.
///
/// # Consistency
///
/// Saves are applied in submission order within their batch and nothing
/// else. Loads are several independent reads, so a load racing a save can
/// observe a mix of old and new state. Codes and slugs are claimed with an
/// atomic set-if-absent, so two entities can never share one.
///
/// # Example
///
/// ```rust
/// use revdoc_core::{DocStore, DoctypeBuilder};
/// use revdoc_storage::InMemoryStore;
/// use std::sync::Arc;
///
/// let store = DocStore::open(Arc::new(InMemoryStore::new())).unwrap();
/// let page = store
///     .register(&DoctypeBuilder::new("page", "Page").field("title", "Title", "string"))
///     .unwrap();
/// assert_eq!(store.load_doctype_by_code("page").unwrap(), *page);
/// ```
pub struct DocStore {
    store: Arc<dyn KeyValueStore>,
    config: Config,
    ids: IdGenerator,
    registry: DoctypeRegistry,
}

impl DocStore {
    /// Opens a document store over `store` with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntropyUnavailable`] if identifiers cannot be
    /// generated.
    pub fn open(store: Arc<dyn KeyValueStore>) -> CoreResult<Self> {
        Self::open_with_config(store, Config::default())
    }

    /// Opens a document store over `store` with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for an invalid configuration and
    /// [`CoreError::EntropyUnavailable`] if identifiers cannot be generated.
    pub fn open_with_config(store: Arc<dyn KeyValueStore>, config: Config) -> CoreResult<Self> {
        config.validate()?;
        let ids = IdGenerator::new(&config)?;
        tracing::info!(
            doctype_index = %config.doctype_index,
            document_index = %config.document_index,
            "document store opened"
        );
        Ok(Self {
            store,
            config,
            ids,
            registry: DoctypeRegistry::new(),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the doctype registry.
    #[must_use]
    pub fn registry(&self) -> &DoctypeRegistry {
        &self.registry
    }

    /// Returns the backing key-value store.
    #[must_use]
    pub fn backend(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Returns the identifier generator.
    #[must_use]
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Doctype reads and batch-level writes.
    #[must_use]
    pub fn doctypes(&self) -> DoctypeStore<'_> {
        DoctypeStore::new(self.store.as_ref(), &self.config, &self.ids)
    }

    /// Document reads and batch-level writes, resolving doctypes through the
    /// registry.
    #[must_use]
    pub fn documents(&self) -> DocumentStore<'_> {
        DocumentStore::new(self.store.as_ref(), &self.config, &self.ids).with_registry(&self.registry)
    }

    /// Revision reads.
    #[must_use]
    pub fn revisions(&self) -> RevisionStore<'_> {
        RevisionStore::new(self.store.as_ref(), &self.config)
    }

    /// Saves `doctype` in one batch.
    ///
    /// On success the doctype carries its id, its field ids and the new
    /// revision, and the registry entry for its code is dropped. On failure
    /// `doctype` is left untouched.
    ///
    /// # Errors
    ///
    /// Any error of [`DoctypeStore::save`], or [`CoreError::Persistence`] if
    /// the batch fails.
    pub fn save_doctype(&self, doctype: &mut Doctype) -> CoreResult<()> {
        self.stage_doctype(doctype, None)
    }

    /// Saves `doctype` in one batch, recording `message` on the new revision.
    ///
    /// # Errors
    ///
    /// See [`DocStore::save_doctype`].
    pub fn save_doctype_with_message(&self, doctype: &mut Doctype, message: &str) -> CoreResult<()> {
        self.stage_doctype(doctype, Some(message))
    }

    fn stage_doctype(&self, doctype: &mut Doctype, message: Option<&str>) -> CoreResult<()> {
        let mut staged = doctype.clone();
        with_batch(self.store.as_ref(), |batch| {
            self.doctypes().save_with_message(&mut staged, message, batch)
        })?;

        let dropped = self.registry.invalidate_doctype(&staged);
        if dropped > 0 {
            tracing::debug!(code = %staged.code, dropped, "registry entries invalidated");
        }
        *doctype = staged;
        Ok(())
    }

    /// Saves `document` in one batch.
    ///
    /// On success the document carries its id, its resolved doctype and the
    /// new revision. On failure `document` is left untouched.
    ///
    /// # Errors
    ///
    /// Any error of [`DocumentStore::save`], or [`CoreError::Persistence`] if
    /// the batch fails.
    pub fn save_document(&self, document: &mut Document) -> CoreResult<()> {
        self.stage_document(document, None)
    }

    /// Saves `document` in one batch, recording `message` on the new revision.
    ///
    /// # Errors
    ///
    /// See [`DocStore::save_document`].
    pub fn save_document_with_message(&self, document: &mut Document, message: &str) -> CoreResult<()> {
        self.stage_document(document, Some(message))
    }

    fn stage_document(&self, document: &mut Document, message: Option<&str>) -> CoreResult<()> {
        let mut staged = document.clone();
        with_batch(self.store.as_ref(), |batch| {
            self.documents().save_with_message(&mut staged, message, batch)
        })?;
        *document = staged;
        Ok(())
    }

    /// Saves the doctype described by `schema` and registers it.
    ///
    /// If the code is already stored, the stored doctype is updated in place:
    /// it keeps its id and the ids of fields whose code is unchanged, and
    /// gets a new revision.
    ///
    /// # Errors
    ///
    /// Any error of the load or the save.
    pub fn register<S: SchemaBuilder + ?Sized>(&self, schema: &S) -> CoreResult<Arc<Doctype>> {
        let mut doctype = schema.build();
        match self.doctypes().load_by_code(&doctype.code) {
            Ok(existing) => {
                doctype.id = existing.id;
                doctype.revision = existing.revision;
                for (code, field) in &mut doctype.fields {
                    if let Some(stored) = existing.fields.get(code) {
                        field.id.clone_from(&stored.id);
                    }
                }
            }
            Err(CoreError::NotFound {
                kind: EntityKind::Doctype,
                ..
            }) => {}
            Err(e) => return Err(e),
        }

        self.save_doctype(&mut doctype)?;
        let doctype = Arc::new(doctype);
        self.registry.insert(Arc::clone(&doctype));
        tracing::info!(code = %doctype.code, "doctype registered");
        Ok(doctype)
    }

    /// Loads a doctype by id.
    ///
    /// # Errors
    ///
    /// See [`DoctypeStore::load_by_id`].
    pub fn load_doctype(&self, id: &str) -> CoreResult<Doctype> {
        self.doctypes().load_by_id(id)
    }

    /// Loads a doctype by code.
    ///
    /// # Errors
    ///
    /// See [`DoctypeStore::load_by_code`].
    pub fn load_doctype_by_code(&self, code: &str) -> CoreResult<Doctype> {
        self.doctypes().load_by_code(code)
    }

    /// Loads a document by id.
    ///
    /// # Errors
    ///
    /// See [`DocumentStore::load_by_id`].
    pub fn load_document(&self, id: &str) -> CoreResult<Document> {
        self.documents().load_by_id(id)
    }

    /// Loads a document by slug.
    ///
    /// # Errors
    ///
    /// See [`DocumentStore::load_by_slug`].
    pub fn load_document_by_slug(&self, slug: &str) -> CoreResult<Document> {
        self.documents().load_by_slug(slug)
    }

    /// Loads every revision of `owner_id`, oldest first.
    ///
    /// # Errors
    ///
    /// See [`RevisionStore::history`].
    pub fn history(&self, owner_id: &str) -> CoreResult<Vec<Revision>> {
        self.revisions().history(owner_id)
    }
}

impl std::fmt::Debug for DocStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocStore")
            .field("config", &self.config)
            .field("registered", &self.registry.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DoctypeBuilder;
    use crate::types::ChangeType;
    use revdoc_storage::InMemoryStore;

    fn open() -> DocStore {
        DocStore::open(Arc::new(InMemoryStore::new())).unwrap()
    }

    fn page_schema() -> DoctypeBuilder {
        DoctypeBuilder::new("page", "Page")
            .field("title", "Title", "string")
            .field("body", "Body", "string")
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = DocStore::open_with_config(
            Arc::new(InMemoryStore::new()),
            Config::new().doctype_id_bytes(1),
        );
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn failed_save_leaves_entity_untouched() {
        let store = open();
        store.save_doctype(&mut page_schema().build()).unwrap();

        let mut duplicate = page_schema().build();
        assert!(store.save_doctype(&mut duplicate).is_err());
        assert_eq!(duplicate.id, None);
        assert_eq!(duplicate.revision, None);
    }

    #[test]
    fn register_is_idempotent_on_ids() {
        let store = open();
        let first = store.register(&page_schema()).unwrap();
        let second = store
            .register(&page_schema().field("summary", "Summary", "string"))
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.fields["title"].id, second.fields["title"].id);
        assert_eq!(second.fields.len(), 3);
        assert_eq!(
            second.revision.as_ref().unwrap().change_type,
            ChangeType::Update
        );
        assert_eq!(store.registry().get("page").unwrap(), second);
    }

    #[test]
    fn saving_a_doctype_invalidates_registry() {
        let store = open();
        let registered = store.register(&page_schema()).unwrap();
        let mut doctype = (*registered).clone();
        doctype.verbose_name = "Pages".into();
        store.save_doctype(&mut doctype).unwrap();

        assert!(store.registry().get("page").is_none());
    }

    #[test]
    fn documents_resolve_through_registry() {
        let store = open();
        store.register(&page_schema()).unwrap();

        let mut doc = Document::new("hello", "page");
        doc.set("title", "Hello");
        store.save_document(&mut doc).unwrap();

        let loaded = store.load_document_by_slug("hello").unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(store.history(doc.id.as_deref().unwrap()).unwrap().len(), 1);
    }
}
