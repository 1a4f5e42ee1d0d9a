//! Field definitions and their persistence.

use crate::batch::Batch;
use crate::config::Config;
use crate::doctype::Doctype;
use crate::error::{CoreError, CoreResult};
use crate::id::{IdGenerator, IdKind};
use crate::keys;
use crate::revision::{Revision, RevisionStore};
use crate::types::EntityKind;
use revdoc_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CODE: &str = "code";
const VERBOSE_NAME: &str = "verbose_name";
const MULTIPLE_VALUES: &str = "multiple_values";
const REVISION: &str = "revision";

/// One typed, named attribute of a doctype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Internal identifier, unique within the doctype.
    ///
    /// Stable across renames of `code` and `verbose_name`.
    #[serde(default)]
    pub id: Option<String>,

    /// Name of the field in payloads. Unique within the doctype.
    #[serde(default)]
    pub code: String,

    /// Human title of the field.
    #[serde(default)]
    pub verbose_name: String,

    /// Accepted value types, primary first.
    ///
    /// More than one type lets a field reference documents of several
    /// doctypes.
    pub expected_types: Vec<String>,

    /// Whether the field holds a list of values.
    #[serde(default)]
    pub multiple_values: bool,

    /// Revision of the doctype save that last wrote this field.
    #[serde(default)]
    pub revision: Option<Revision>,
}

impl Field {
    /// Creates an unsaved single-valued field.
    pub fn new<I, S>(code: impl Into<String>, verbose_name: impl Into<String>, expected_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: None,
            code: code.into(),
            verbose_name: verbose_name.into(),
            expected_types: expected_types.into_iter().map(Into::into).collect(),
            multiple_values: false,
            revision: None,
        }
    }

    /// Marks the field as holding a list of values.
    #[must_use]
    pub fn multiple(mut self) -> Self {
        self.multiple_values = true;
        self
    }
}

/// Reads and writes field definitions.
///
/// Every field is written twice: under its doctype (current state) and under
/// the revision that wrote it, so the field set of any past revision can be
/// rebuilt.
#[derive(Clone, Copy)]
pub struct FieldStore<'a> {
    store: &'a dyn KeyValueStore,
    config: &'a Config,
    ids: &'a IdGenerator,
}

impl<'a> FieldStore<'a> {
    /// Creates a field store.
    pub fn new(store: &'a dyn KeyValueStore, config: &'a Config, ids: &'a IdGenerator) -> Self {
        Self { store, config, ids }
    }

    /// Queues the writes of `field` into `batch`.
    ///
    /// Assigns an id if the field has none. The field must already carry the
    /// revision of the doctype save that writes it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the field has no revision.
    pub fn save(&self, field: &mut Field, doctype_id: &str, batch: &mut Batch) -> CoreResult<()> {
        let revision = field.revision.as_ref().ok_or_else(|| {
            CoreError::invalid_input(format!("field '{}' has no revision", field.code))
        })?;
        let field_id = field
            .id
            .get_or_insert_with(|| self.ids.generate(IdKind::Field))
            .clone();

        batch.zadd(
            keys::field_revisions(doctype_id, &field_id),
            &revision.id,
            revision.score(),
        );
        batch.hset(keys::field(doctype_id, &field_id), REVISION, &revision.id);

        for scope in [doctype_id, revision.id.as_str()] {
            let base = keys::field(scope, &field_id);
            batch.sadd(keys::fields(scope), &field_id);
            batch.hset(&base, VERBOSE_NAME, &field.verbose_name);
            batch.hset(&base, CODE, &field.code);
            batch.hset(&base, MULTIPLE_VALUES, field.multiple_values.to_string());

            let types_key = keys::expected_types(scope, &field_id);
            batch.del(&types_key);
            for (position, tag) in field.expected_types.iter().enumerate() {
                batch.zadd(&types_key, tag, position as f64);
            }
        }
        Ok(())
    }

    /// Loads field `id` of `doctype` and inserts it into `doctype.fields`.
    ///
    /// The field's revision is resolved by id, reusing the doctype's own
    /// revision when they match.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] if the doctype has no id
    /// - [`CoreError::NotFound`] if the field has no record
    /// - [`CoreError::Decode`] if `multiple_values` is not a boolean
    /// - Any error of the revision load
    pub fn load_by_id(&self, doctype: &mut Doctype, id: &str) -> CoreResult<()> {
        let doctype_id = doctype
            .id
            .as_deref()
            .ok_or_else(|| CoreError::invalid_input("doctype has no id"))?;
        let record = self.read_record(doctype_id, id)?;
        let multiple_values = parse_multiple_values(id, &record)?;

        let revision_id = record.get(REVISION).map(String::as_str).unwrap_or_default();
        let revision = match &doctype.revision {
            Some(rev) if rev.id == revision_id => rev.clone(),
            _ => RevisionStore::new(self.store, self.config).load_by_id(revision_id)?,
        };

        let field = self.build(doctype_id, id, &record, multiple_values, revision)?;
        doctype.fields.insert(field.code.clone(), field);
        Ok(())
    }

    /// Loads field `id` as written by `revision`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the revision has no such field
    /// - [`CoreError::Decode`] if `multiple_values` is not a boolean
    pub fn load_at_revision(&self, revision: &Revision, id: &str) -> CoreResult<Field> {
        let record = self.read_record(&revision.id, id)?;
        let multiple_values = parse_multiple_values(id, &record)?;
        self.build(&revision.id, id, &record, multiple_values, revision.clone())
    }

    fn read_record(&self, scope: &str, id: &str) -> CoreResult<HashMap<String, String>> {
        let record = self.store.hget_all(&keys::field(scope, id))?;
        if record.is_empty() {
            return Err(CoreError::not_found(EntityKind::Field, keys::field(scope, id)));
        }
        Ok(record)
    }

    fn build(
        &self,
        scope: &str,
        id: &str,
        record: &HashMap<String, String>,
        multiple_values: bool,
        revision: Revision,
    ) -> CoreResult<Field> {
        let expected_types = self
            .store
            .zrange(&keys::expected_types(scope, id))?
            .into_iter()
            .map(|(tag, _)| tag)
            .collect();

        Ok(Field {
            id: Some(id.to_string()),
            code: record.get(CODE).cloned().unwrap_or_default(),
            verbose_name: record.get(VERBOSE_NAME).cloned().unwrap_or_default(),
            expected_types,
            multiple_values,
            revision: Some(revision),
        })
    }
}

/// Parses the `multiple_values` flag of a field record.
fn parse_multiple_values(id: &str, record: &HashMap<String, String>) -> CoreResult<bool> {
    let text = record
        .get(MULTIPLE_VALUES)
        .map(String::as_str)
        .unwrap_or_default();
    text.parse::<bool>().map_err(|_| {
        CoreError::decode(format!("field {id}: multiple_values '{text}' is not a boolean"))
    })
}

impl std::fmt::Debug for FieldStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldStore").finish_non_exhaustive()
    }
}
