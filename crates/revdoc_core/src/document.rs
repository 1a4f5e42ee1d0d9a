//! Documents and their persistence.

use crate::batch::Batch;
use crate::config::Config;
use crate::doctype::{claim_index_key, release_previous_key, Doctype, DoctypeStore};
use crate::error::{CoreError, CoreResult};
use crate::id::{IdGenerator, IdKind};
use crate::keys;
use crate::registry::DoctypeRegistry;
use crate::revision::{next_revision, Revision, RevisionStore};
use crate::types::EntityKind;
use crate::value;
use revdoc_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;

const TYPE: &str = "type";
const SLUG: &str = "slug";
const DOCTYPE: &str = "doctype";
const REVISION: &str = "revision";

/// An instance of data conforming to a doctype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Internal identifier.
    #[serde(default)]
    pub id: Option<String>,

    /// Public name of the document. Globally unique.
    pub slug: String,

    /// Code of the doctype this document conforms to.
    #[serde(rename = "doctype")]
    pub doctype_code: String,

    /// The resolved doctype. Filled in by saves and loads.
    #[serde(skip)]
    pub doctype: Option<Doctype>,

    /// Field values keyed by field code.
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,

    /// Revision of the last save.
    #[serde(default)]
    pub revision: Option<Revision>,
}

impl Document {
    /// Creates an unsaved document without values.
    pub fn new(slug: impl Into<String>, doctype_code: impl Into<String>) -> Self {
        Self {
            id: None,
            slug: slug.into(),
            doctype_code: doctype_code.into(),
            doctype: None,
            fields: BTreeMap::new(),
            revision: None,
        }
    }

    /// Decodes a document from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`] if the payload is malformed.
    pub fn decode<R: Read>(reader: R) -> CoreResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Sets the value of field `code`.
    pub fn set(&mut self, code: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(code.into(), value.into());
    }

    /// Returns the value of field `code`.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&Value> {
        self.fields.get(code)
    }
}

/// Reads and writes documents.
#[derive(Clone, Copy)]
pub struct DocumentStore<'a> {
    store: &'a dyn KeyValueStore,
    config: &'a Config,
    ids: &'a IdGenerator,
    registry: Option<&'a DoctypeRegistry>,
}

impl<'a> DocumentStore<'a> {
    /// Creates a document store.
    pub fn new(store: &'a dyn KeyValueStore, config: &'a Config, ids: &'a IdGenerator) -> Self {
        Self {
            store,
            config,
            ids,
            registry: None,
        }
    }

    /// Resolves doctypes through `registry` before reading the store.
    #[must_use]
    pub fn with_registry(mut self, registry: &'a DoctypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    fn revisions(&self) -> RevisionStore<'a> {
        RevisionStore::new(self.store, self.config)
    }

    fn doctypes(&self) -> DoctypeStore<'a> {
        DoctypeStore::new(self.store, self.config, self.ids)
    }

    fn resolve_doctype(&self, code: &str) -> CoreResult<Doctype> {
        if let Some(doctype) = self.registry.and_then(|r| r.get(code)) {
            return Ok(doctype.as_ref().clone());
        }
        self.doctypes().load_by_code(code)
    }

    /// Queues the writes of `document` into `batch`.
    ///
    /// Resolves the doctype by code if none is attached, serializes every
    /// value, then claims the slug and queues the record, the revision and
    /// the values under both the document and the revision. The current
    /// values are replaced as a whole. Absent and `null` values are not
    /// stored. On success `document.fields` holds what a load returns:
    /// `null` entries are dropped and every value is in its stored form,
    /// so datetimes are in UTC and float fields hold floats.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for a bad slug, an unsaved doctype, or a
    ///   value for a field the doctype does not declare
    /// - Any error of the doctype resolution
    /// - [`CoreError::InvalidValue`] or [`CoreError::UnsupportedFieldKind`]
    ///   from value serialization
    /// - [`CoreError::Conflict`] if the slug belongs to another document
    pub fn save(&self, document: &mut Document, batch: &mut Batch) -> CoreResult<()> {
        self.save_with_message(document, None, batch)
    }

    /// Queues the writes of `document` into `batch`, attaching `message` to the
    /// new revision.
    ///
    /// # Errors
    ///
    /// See [`DocumentStore::save`].
    pub fn save_with_message(
        &self,
        document: &mut Document,
        message: Option<&str>,
        batch: &mut Batch,
    ) -> CoreResult<()> {
        if !keys::is_valid_segment(&document.slug) {
            return Err(CoreError::invalid_input(format!(
                "slug '{}' must be non-empty and free of '{}'",
                document.slug,
                keys::SEPARATOR
            )));
        }

        if document.doctype.is_none() {
            document.doctype = Some(self.resolve_doctype(&document.doctype_code)?);
        }
        let doctype = document
            .doctype
            .as_ref()
            .ok_or_else(|| CoreError::invalid_input("document has no doctype"))?;
        let doctype_id = doctype
            .id
            .clone()
            .ok_or_else(|| CoreError::invalid_input(format!("doctype '{}' is not saved", doctype.code)))?;

        if let Some(unknown) = document.fields.keys().find(|code| !doctype.fields.contains_key(*code)) {
            return Err(CoreError::invalid_input(format!(
                "doctype '{}' declares no field '{unknown}'",
                doctype.code
            )));
        }

        let mut encoded = Vec::with_capacity(doctype.fields.len());
        let mut stored = BTreeMap::new();
        for field in doctype.fields.values() {
            let Some(raw_value) = document.fields.get(&field.code) else {
                continue;
            };
            if let Some(raw) = value::encode_field(field, raw_value)? {
                let field_id = field.id.clone().ok_or_else(|| {
                    CoreError::invalid_input(format!("field '{}' is not saved", field.code))
                })?;
                stored.insert(field.code.clone(), value::decode_field(field, &raw)?);
                encoded.push((field_id, raw));
            }
        }
        let doctype_code = doctype.code.clone();

        let id = document
            .id
            .get_or_insert_with(|| self.ids.generate(IdKind::Document))
            .clone();
        claim_index_key(
            self.store,
            batch,
            &self.config.document_index,
            &document.slug,
            &id,
            EntityKind::Document,
        )?;
        release_previous_key(self.store, batch, &self.config.document_index, &id, SLUG, &document.slug)?;

        let revision = next_revision(document.revision.as_ref(), &id, self.ids, message);
        self.revisions().save(&revision, batch);

        batch.hset(&id, REVISION, &revision.id);
        batch.hset(&id, TYPE, EntityKind::Document.as_str());
        for base in [id.as_str(), revision.id.as_str()] {
            batch.hset(base, SLUG, &document.slug);
            batch.hset(base, DOCTYPE, &doctype_id);
        }

        batch.del(keys::values(&id));
        for base in [id.as_str(), revision.id.as_str()] {
            let values_key = keys::values(base);
            for (field_id, raw) in &encoded {
                batch.hset(&values_key, field_id, raw);
            }
        }

        tracing::debug!(
            document = %id,
            slug = %document.slug,
            doctype = %doctype_code,
            revision = %revision.id,
            values = encoded.len(),
            "document save queued"
        );
        document.doctype_code = doctype_code;
        document.fields = stored;
        document.revision = Some(revision);
        Ok(())
    }

    /// Loads a document by id.
    ///
    /// The doctype, the revision and the values are separate reads and are
    /// not isolated from concurrent saves.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if no record exists
    /// - [`CoreError::TypeMismatch`] if the record is not a document
    /// - Any error of the doctype, revision or value loads
    pub fn load_by_id(&self, id: &str) -> CoreResult<Document> {
        let record = self.store.hget_all(id)?;
        if record.is_empty() {
            return Err(CoreError::not_found(EntityKind::Document, id));
        }
        let kind = record.get(TYPE).map(String::as_str).unwrap_or_default();
        if kind != EntityKind::Document.as_str() {
            return Err(CoreError::type_mismatch(id, EntityKind::Document, kind));
        }

        let doctype_id = record.get(DOCTYPE).map(String::as_str).unwrap_or_default();
        let doctype = self.doctypes().load_by_id(doctype_id)?;
        let revision_id = record.get(REVISION).map(String::as_str).unwrap_or_default();
        let revision = self.revisions().load_by_id(revision_id)?;
        let values = self.store.hget_all(&keys::values(id))?;

        let document = assemble(
            id,
            record.get(SLUG).cloned().unwrap_or_default(),
            doctype,
            revision,
            &values,
        )?;
        tracing::debug!(document = %id, slug = %document.slug, "document loaded");
        Ok(document)
    }

    /// Loads a document by slug.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the slug is not registered, or any
    /// error of [`DocumentStore::load_by_id`].
    pub fn load_by_slug(&self, slug: &str) -> CoreResult<Document> {
        let id = self
            .store
            .hget(&self.config.document_index, slug)?
            .ok_or_else(|| CoreError::not_found(EntityKind::Document, slug))?;
        self.load_by_id(&id)
    }

    /// Loads the document as it was written by `revision_id`.
    ///
    /// Values are decoded with the doctype's current field definitions.
    ///
    /// # Errors
    ///
    /// - Any error of the revision load
    /// - [`CoreError::TypeMismatch`] if the revision was not written by a
    ///   document save
    /// - Any error of the doctype or value loads
    pub fn load_at_revision(&self, revision_id: &str) -> CoreResult<Document> {
        let (revision, record) = self.revisions().load_record(revision_id)?;
        let slug = record
            .get(SLUG)
            .cloned()
            .ok_or_else(|| CoreError::type_mismatch(revision_id, EntityKind::Document, "revision"))?;
        let doctype_id = record.get(DOCTYPE).map(String::as_str).unwrap_or_default();
        let doctype = self.doctypes().load_by_id(doctype_id)?;
        let values = self.store.hget_all(&keys::values(revision_id))?;

        let owner = revision.object.clone();
        assemble(&owner, slug, doctype, revision, &values)
    }

    /// Loads every revision of document `id`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates the first revision that fails to load.
    pub fn history(&self, id: &str) -> CoreResult<Vec<Revision>> {
        self.revisions().history(id)
    }
}

impl std::fmt::Debug for DocumentStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("index", &self.config.document_index)
            .field("registry", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds a document from its parts, decoding each declared field's value.
fn assemble(
    id: &str,
    slug: String,
    doctype: Doctype,
    revision: Revision,
    values: &HashMap<String, String>,
) -> CoreResult<Document> {
    let mut fields = BTreeMap::new();
    for field in doctype.fields.values() {
        let Some(field_id) = field.id.as_deref() else {
            continue;
        };
        if let Some(raw) = values.get(field_id) {
            fields.insert(field.code.clone(), value::decode_field(field, raw)?);
        }
    }

    Ok(Document {
        id: Some(id.to_string()),
        slug,
        doctype_code: doctype.code.clone(),
        doctype: Some(doctype),
        fields,
        revision: Some(revision),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::with_batch;
    use crate::field::Field;
    use crate::types::ChangeType;
    use revdoc_storage::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        store: InMemoryStore,
        config: Config,
        ids: IdGenerator,
    }

    impl Fixture {
        fn new() -> Self {
            let config = Config::default();
            let ids = IdGenerator::new(&config).unwrap();
            let fx = Self {
                store: InMemoryStore::new(),
                config,
                ids,
            };
            let mut page = Doctype::new("page", "Pagina");
            page.add_field(Field::new("title", "Titulo", ["string"]));
            page.add_field(Field::new("body", "Texto", ["string"]));
            page.add_field(Field::new("views", "Views", ["integer"]));
            page.add_field(Field::new("tags", "Tags", ["string"]).multiple());
            with_batch(&fx.store, |batch| fx.doctypes().save(&mut page, batch)).unwrap();
            fx
        }

        fn doctypes(&self) -> DoctypeStore<'_> {
            DoctypeStore::new(&self.store, &self.config, &self.ids)
        }

        fn documents(&self) -> DocumentStore<'_> {
            DocumentStore::new(&self.store, &self.config, &self.ids)
        }

        fn save(&self, document: &mut Document) -> CoreResult<()> {
            with_batch(&self.store, |batch| self.documents().save(document, batch))
        }
    }

    fn first_page() -> Document {
        let mut doc = Document::new("my-first-page", "page");
        doc.set("title", "My First Page");
        doc.set("body", "Here comes the body");
        doc
    }

    #[test]
    fn save_then_load_roundtrip() {
        let fx = Fixture::new();
        let mut created = first_page();
        created.set("views", 12);
        created.set("tags", json!(["intro", "news"]));
        fx.save(&mut created).unwrap();

        let id = created.id.clone().unwrap();
        assert_eq!(id.len(), 24);
        let loaded = fx.documents().load_by_id(&id).unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.get("title"), Some(&json!("My First Page")));
    }

    #[test]
    fn saved_values_match_what_loads() {
        let fx = Fixture::new();
        let mut created = first_page();
        created.set("body", Value::Null);
        created.set("tags", json!([]));
        fx.save(&mut created).unwrap();

        assert!(created.get("body").is_none());
        assert_eq!(created.get("tags"), Some(&json!([])));
        let loaded = fx.documents().load_by_id(created.id.as_deref().unwrap()).unwrap();
        assert_eq!(loaded, created);
    }

    #[test]
    fn load_by_slug() {
        let fx = Fixture::new();
        let mut created = first_page();
        fx.save(&mut created).unwrap();

        assert_eq!(fx.documents().load_by_slug("my-first-page").unwrap(), created);
        assert!(fx.documents().load_by_slug("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn unknown_doctype_propagates() {
        let fx = Fixture::new();
        let mut doc = Document::new("x", "post");
        assert!(matches!(
            fx.save(&mut doc),
            Err(CoreError::NotFound { kind: EntityKind::Doctype, .. })
        ));
    }

    #[test]
    fn undeclared_field_is_rejected() {
        let fx = Fixture::new();
        let mut doc = first_page();
        doc.set("subtitle", "nope");
        assert!(matches!(fx.save(&mut doc), Err(CoreError::InvalidInput { .. })));
        assert!(fx.store.hget("documents", "my-first-page").unwrap().is_none());
    }

    #[test]
    fn wrong_value_type_writes_nothing() {
        let fx = Fixture::new();
        let keys_before = fx.store.keys();
        let mut doc = first_page();
        doc.set("views", "twelve");

        assert!(matches!(fx.save(&mut doc), Err(CoreError::InvalidValue { .. })));
        assert_eq!(fx.store.keys(), keys_before);
    }

    #[test]
    fn duplicate_slug_conflicts() {
        let fx = Fixture::new();
        fx.save(&mut first_page()).unwrap();
        assert!(matches!(
            fx.save(&mut first_page()),
            Err(CoreError::Conflict { kind: EntityKind::Document, .. })
        ));
    }

    #[test]
    fn resave_keeps_history() {
        let fx = Fixture::new();
        let mut doc = first_page();
        fx.save(&mut doc).unwrap();
        let first = doc.revision.clone().unwrap();
        let id = doc.id.clone().unwrap();

        doc.set("title", "Renamed");
        doc.fields.remove("body");
        fx.save(&mut doc).unwrap();
        let second = doc.revision.clone().unwrap();
        assert_eq!(second.change_type, ChangeType::Update);

        let current = fx.documents().load_by_id(&id).unwrap();
        assert_eq!(current.get("title"), Some(&json!("Renamed")));
        assert_eq!(current.get("body"), None);

        let old = fx.documents().load_at_revision(&first.id).unwrap();
        assert_eq!(old.get("title"), Some(&json!("My First Page")));
        assert_eq!(old.get("body"), Some(&json!("Here comes the body")));
        assert_eq!(old.id.as_deref(), Some(id.as_str()));

        assert_eq!(fx.documents().history(&id).unwrap(), vec![first, second]);
    }

    #[test]
    fn doctype_revision_is_not_a_document_revision() {
        let fx = Fixture::new();
        let doctype = fx.doctypes().load_by_code("page").unwrap();
        let rev_id = doctype.revision.unwrap().id;
        assert!(matches!(
            fx.documents().load_at_revision(&rev_id),
            Err(CoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn loading_other_kinds_is_type_mismatch() {
        let fx = Fixture::new();
        let doctype = fx.doctypes().load_by_code("page").unwrap();

        assert!(matches!(
            fx.documents().load_by_id(doctype.id.as_deref().unwrap()),
            Err(CoreError::TypeMismatch { expected: EntityKind::Document, .. })
        ));
        assert!(matches!(
            fx.documents().load_by_id(&doctype.revision.unwrap().id),
            Err(CoreError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn registry_resolves_without_store_lookup() {
        let fx = Fixture::new();
        let registry = DoctypeRegistry::new();
        let doctype = fx.doctypes().load_by_code("page").unwrap();
        registry.insert(Arc::new(doctype.clone()));

        let mut doc = first_page();
        with_batch(&fx.store, |batch| {
            fx.documents().with_registry(&registry).save(&mut doc, batch)
        })
        .unwrap();
        assert_eq!(doc.doctype, Some(doctype));
    }

    #[test]
    fn payload_shape() {
        let doc = Document::decode(
            r#"{"slug": "my-first-page", "doctype": "page", "fields": {"title": "My First Page"}}"#
                .as_bytes(),
        )
        .unwrap();
        assert_eq!(doc.doctype_code, "page");
        assert_eq!(doc.doctype, None);

        let out = serde_json::to_value(&doc).unwrap();
        assert_eq!(out["doctype"], json!("page"));
        assert!(out.get("fields").is_some());
    }
}
