//! Doctype schemas and their persistence.

use crate::batch::Batch;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::field::{Field, FieldStore};
use crate::id::{IdGenerator, IdKind};
use crate::keys;
use crate::revision::{next_revision, Revision, RevisionStore};
use crate::types::EntityKind;
use crate::value::ValueKind;
use revdoc_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

const TYPE: &str = "type";
const CODE: &str = "code";
const VERBOSE_NAME: &str = "verbose_name";
const REVISION: &str = "revision";

/// A named, versioned schema describing a document's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctype {
    /// Internal identifier. Stable across renames of `code`.
    #[serde(default)]
    pub id: Option<String>,

    /// Public name of the doctype. Globally unique.
    pub code: String,

    /// Human title of the doctype.
    #[serde(default)]
    pub verbose_name: String,

    /// Field definitions keyed by field code.
    #[serde(default)]
    pub fields: BTreeMap<String, Field>,

    /// Revision of the last save.
    #[serde(default)]
    pub revision: Option<Revision>,
}

impl Doctype {
    /// Creates an unsaved doctype without fields.
    pub fn new(code: impl Into<String>, verbose_name: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            verbose_name: verbose_name.into(),
            fields: BTreeMap::new(),
            revision: None,
        }
    }

    /// Decodes a doctype from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Json`] if the payload is malformed.
    pub fn decode<R: Read>(reader: R) -> CoreResult<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Adds a field, keyed by its code.
    pub fn add_field(&mut self, field: Field) {
        self.fields.insert(field.code.clone(), field);
    }

    /// Returns the field with `code`.
    #[must_use]
    pub fn field(&self, code: &str) -> Option<&Field> {
        self.fields.get(code)
    }

    /// Checks codes and field types before anything is written.
    fn validate(&self) -> CoreResult<()> {
        if !keys::is_valid_segment(&self.code) {
            return Err(CoreError::invalid_input(format!(
                "doctype code '{}' must be non-empty and free of '{}'",
                self.code,
                keys::SEPARATOR
            )));
        }
        for (code, field) in &self.fields {
            if !keys::is_valid_segment(code) {
                return Err(CoreError::invalid_input(format!(
                    "field code '{code}' must be non-empty and free of '{}'",
                    keys::SEPARATOR
                )));
            }
            if field.expected_types.is_empty() {
                return Err(CoreError::unsupported_field_kind(code, ""));
            }
            for tag in &field.expected_types {
                ValueKind::from_tag(code, tag)?;
            }
        }
        Ok(())
    }
}

/// Reads and writes doctypes.
#[derive(Clone, Copy)]
pub struct DoctypeStore<'a> {
    store: &'a dyn KeyValueStore,
    config: &'a Config,
    ids: &'a IdGenerator,
}

impl<'a> DoctypeStore<'a> {
    /// Creates a doctype store.
    pub fn new(store: &'a dyn KeyValueStore, config: &'a Config, ids: &'a IdGenerator) -> Self {
        Self { store, config, ids }
    }

    fn revisions(&self) -> RevisionStore<'a> {
        RevisionStore::new(self.store, self.config)
    }

    fn fields(&self) -> FieldStore<'a> {
        FieldStore::new(self.store, self.config, self.ids)
    }

    /// Queues the writes of `doctype` into `batch`.
    ///
    /// Assigns an id if absent and claims the doctype's code in the code
    /// index right away. A doctype saved before gets an update revision
    /// chained to its current one; otherwise a create revision. The current
    /// field set is replaced as a whole by the fields of `doctype`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for a bad doctype or field code
    /// - [`CoreError::UnsupportedFieldKind`] for a field type without
    ///   serializer, or a reference to a doctype code that is not stored
    /// - [`CoreError::Conflict`] if the code belongs to another doctype
    pub fn save(&self, doctype: &mut Doctype, batch: &mut Batch) -> CoreResult<()> {
        self.save_with_message(doctype, None, batch)
    }

    /// Queues the writes of `doctype` into `batch`, attaching `message` to the
    /// new revision.
    ///
    /// # Errors
    ///
    /// See [`DoctypeStore::save`].
    pub fn save_with_message(
        &self,
        doctype: &mut Doctype,
        message: Option<&str>,
        batch: &mut Batch,
    ) -> CoreResult<()> {
        doctype.validate()?;
        self.check_references(doctype)?;

        let id = doctype
            .id
            .get_or_insert_with(|| self.ids.generate(IdKind::Doctype))
            .clone();
        claim_index_key(
            self.store,
            batch,
            &self.config.doctype_index,
            &doctype.code,
            &id,
            EntityKind::Doctype,
        )?;
        release_previous_key(self.store, batch, &self.config.doctype_index, &id, CODE, &doctype.code)?;

        let revision = next_revision(doctype.revision.as_ref(), &id, self.ids, message);
        self.revisions().save(&revision, batch);

        batch.hset(&id, REVISION, &revision.id);
        batch.hset(&id, TYPE, EntityKind::Doctype.as_str());
        for base in [id.as_str(), revision.id.as_str()] {
            batch.hset(base, CODE, &doctype.code);
            batch.hset(base, VERBOSE_NAME, &doctype.verbose_name);
        }

        batch.del(keys::fields(&id));
        for (code, field) in &mut doctype.fields {
            field.code = code.clone();
            field.revision = Some(revision.clone());
            self.fields().save(field, &id, batch)?;
        }

        tracing::debug!(
            doctype = %id,
            code = %doctype.code,
            revision = %revision.id,
            fields = doctype.fields.len(),
            "doctype save queued"
        );
        doctype.revision = Some(revision);
        Ok(())
    }

    /// Rejects reference tags that name neither `doctype` itself nor a
    /// stored doctype code.
    fn check_references(&self, doctype: &Doctype) -> CoreResult<()> {
        for (code, field) in &doctype.fields {
            for tag in &field.expected_types {
                let ValueKind::Reference(target) = ValueKind::from_tag(code, tag)? else {
                    continue;
                };
                if target != doctype.code
                    && self.store.hget(&self.config.doctype_index, &target)?.is_none()
                {
                    return Err(CoreError::unsupported_field_kind(code, tag));
                }
            }
        }
        Ok(())
    }

    /// Loads a doctype by id.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if no record exists
    /// - [`CoreError::TypeMismatch`] if the record is not a doctype
    /// - Any error of the revision or field loads
    pub fn load_by_id(&self, id: &str) -> CoreResult<Doctype> {
        let record = self.store.hget_all(id)?;
        if record.is_empty() {
            return Err(CoreError::not_found(EntityKind::Doctype, id));
        }
        let kind = record.get(TYPE).map(String::as_str).unwrap_or_default();
        if kind != EntityKind::Doctype.as_str() {
            return Err(CoreError::type_mismatch(id, EntityKind::Doctype, kind));
        }

        let revision_id = record.get(REVISION).map(String::as_str).unwrap_or_default();
        let mut doctype = Doctype {
            id: Some(id.to_string()),
            code: record.get(CODE).cloned().unwrap_or_default(),
            verbose_name: record.get(VERBOSE_NAME).cloned().unwrap_or_default(),
            fields: BTreeMap::new(),
            revision: Some(self.revisions().load_by_id(revision_id)?),
        };

        let fields = self.fields();
        for field_id in self.store.smembers(&keys::fields(id))? {
            fields.load_by_id(&mut doctype, &field_id)?;
        }

        tracing::debug!(doctype = %id, code = %doctype.code, "doctype loaded");
        Ok(doctype)
    }

    /// Loads a doctype by code.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the code is not registered, or any
    /// error of [`DoctypeStore::load_by_id`].
    pub fn load_by_code(&self, code: &str) -> CoreResult<Doctype> {
        let id = self
            .store
            .hget(&self.config.doctype_index, code)?
            .ok_or_else(|| CoreError::not_found(EntityKind::Doctype, code))?;
        self.load_by_id(&id)
    }

    /// Loads the doctype as it was written by `revision_id`.
    ///
    /// # Errors
    ///
    /// - Any error of the revision load
    /// - [`CoreError::TypeMismatch`] if the revision was not written by a
    ///   doctype save
    pub fn load_at_revision(&self, revision_id: &str) -> CoreResult<Doctype> {
        let (revision, record) = self.revisions().load_record(revision_id)?;
        let code = record
            .get(CODE)
            .cloned()
            .ok_or_else(|| CoreError::type_mismatch(revision_id, EntityKind::Doctype, "revision"))?;

        let mut doctype = Doctype {
            id: Some(revision.object.clone()),
            code,
            verbose_name: record.get(VERBOSE_NAME).cloned().unwrap_or_default(),
            fields: BTreeMap::new(),
            revision: None,
        };

        let fields = self.fields();
        for field_id in self.store.smembers(&keys::fields(revision_id))? {
            let field = fields.load_at_revision(&revision, &field_id)?;
            doctype.fields.insert(field.code.clone(), field);
        }
        doctype.revision = Some(revision);
        Ok(doctype)
    }

    /// Loads every revision of doctype `id`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates the first revision that fails to load.
    pub fn history(&self, id: &str) -> CoreResult<Vec<Revision>> {
        self.revisions().history(id)
    }
}

impl std::fmt::Debug for DoctypeStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoctypeStore")
            .field("index", &self.config.doctype_index)
            .finish_non_exhaustive()
    }
}

/// Claims `key -> id` in the hash `index` with an atomic set-if-absent.
///
/// A fresh claim is recorded on `batch` so it is released if the batch is
/// never applied. Re-claiming a key already owned by `id` is a no-op.
pub(crate) fn claim_index_key(
    store: &dyn KeyValueStore,
    batch: &mut Batch,
    index: &str,
    key: &str,
    id: &str,
    kind: EntityKind,
) -> CoreResult<()> {
    // Two attempts: the owner may release the key between our write and read.
    for _ in 0..2 {
        if store.hset_nx(index, key, id)? {
            batch.record_claim(index, key);
            return Ok(());
        }
        match store.hget(index, key)? {
            Some(owner) if owner == id => return Ok(()),
            Some(owner) => return Err(CoreError::conflict(kind, key, owner)),
            None => continue,
        }
    }
    Err(CoreError::conflict(kind, key, "a concurrent writer"))
}

/// Queues the removal of the index entry an entity held under its previous
/// name, read from the `attr` field of its base record.
pub(crate) fn release_previous_key(
    store: &dyn KeyValueStore,
    batch: &mut Batch,
    index: &str,
    id: &str,
    attr: &str,
    current: &str,
) -> CoreResult<()> {
    if let Some(previous) = store.hget(id, attr)? {
        if previous != current {
            tracing::debug!(index = %index, previous = %previous, current = %current, "releasing renamed key");
            batch.hdel(index, previous);
        }
    }
    Ok(())
}
