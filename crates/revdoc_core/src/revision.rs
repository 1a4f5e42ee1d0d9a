//! Revision chain.
//!
//! A revision is created inside every save of a doctype or document and is
//! never mutated or deleted afterwards. Revisions of one owner are ordered by
//! the `{owner}/revisions` sorted set; all revisions are also ordered by the
//! global index.

use crate::batch::Batch;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::id::{IdGenerator, IdKind};
use crate::keys;
use crate::types::{ChangeType, EntityKind};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use revdoc_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record fields written on every revision hash.
const TYPE: &str = "type";
const OBJECT: &str = "object";
const WHEN: &str = "when";
const CHANGE_TYPE: &str = "change_type";
const PARENT: &str = "parent";
const MESSAGE: &str = "message";

/// Metadata of one save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Revision identifier.
    pub id: String,

    /// Message summarizing the revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Time of the save, UTC.
    pub when: DateTime<Utc>,

    /// Kind of change.
    #[serde(rename = "type")]
    pub change_type: ChangeType,

    /// The immediately preceding revision of the same owner.
    #[serde(default)]
    pub parent: Option<String>,

    /// Identifier of the entity that owns this revision.
    #[serde(skip)]
    pub object: String,
}

impl Revision {
    /// Creates the first revision of `owner_id`.
    #[must_use]
    pub fn create(owner_id: &str, ids: &IdGenerator) -> Self {
        Self {
            id: ids.generate(IdKind::Revision),
            message: None,
            when: Utc::now(),
            change_type: ChangeType::Create,
            parent: None,
            object: owner_id.to_string(),
        }
    }

    /// Creates the revision following `parent` for the same owner.
    ///
    /// The new revision points at `parent` and is timestamped strictly after
    /// it, so the owner's chronological index keeps creation order even when
    /// the clock does not advance between two saves.
    #[must_use]
    pub fn update(parent: &Self, ids: &IdGenerator) -> Self {
        let earliest = parent.when + Duration::microseconds(1);
        Self {
            id: ids.generate(IdKind::Revision),
            message: None,
            when: Utc::now().max(earliest),
            change_type: ChangeType::Update,
            parent: Some(parent.id.clone()),
            object: parent.object.clone(),
        }
    }

    /// Sets the revision message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns the score used by chronological indices.
    ///
    /// Unix epoch seconds with microsecond fraction.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.when.timestamp_micros() as f64 / 1_000_000.0
    }

    /// Returns the stored text form of [`Revision::when`].
    #[must_use]
    pub fn when_text(&self) -> String {
        self.when.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }
}

/// Next revision for an entity that may already carry one.
///
/// An entity saved before gets an update revision chained to its current
/// one; anything else starts a new chain. `message` is attached to the new
/// revision.
pub(crate) fn next_revision(
    current: Option<&Revision>,
    owner_id: &str,
    ids: &IdGenerator,
    message: Option<&str>,
) -> Revision {
    let revision = match current {
        Some(parent) if parent.object == owner_id => Revision::update(parent, ids),
        _ => Revision::create(owner_id, ids),
    };
    match message {
        Some(message) => revision.with_message(message),
        None => revision,
    }
}

/// Reads and writes revision records.
#[derive(Clone, Copy)]
pub struct RevisionStore<'a> {
    store: &'a dyn KeyValueStore,
    config: &'a Config,
}

impl<'a> RevisionStore<'a> {
    /// Creates a revision store over `store`.
    pub fn new(store: &'a dyn KeyValueStore, config: &'a Config) -> Self {
        Self { store, config }
    }

    /// Queues the writes of `revision` into `batch`.
    ///
    /// Adds the revision to the global and the owner's chronological index
    /// and writes its record keyed by the revision id.
    pub fn save(&self, revision: &Revision, batch: &mut Batch) {
        let score = revision.score();
        batch.zadd(&self.config.revisions_index, &revision.id, score);
        batch.zadd(keys::revisions(&revision.object), &revision.id, score);

        batch.hset(&revision.id, TYPE, EntityKind::Revision.as_str());
        batch.hset(&revision.id, OBJECT, &revision.object);
        batch.hset(&revision.id, WHEN, revision.when_text());
        batch.hset(&revision.id, CHANGE_TYPE, revision.change_type.as_str());
        batch.hset(&revision.id, PARENT, revision.parent.as_deref().unwrap_or(""));
        if let Some(message) = &revision.message {
            batch.hset(&revision.id, MESSAGE, message);
        }
    }

    /// Loads a revision by id.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if no record exists
    /// - [`CoreError::TypeMismatch`] if the record is not a revision
    /// - [`CoreError::Decode`] if the timestamp or change type is malformed
    pub fn load_by_id(&self, id: &str) -> CoreResult<Revision> {
        self.load_record(id).map(|(revision, _)| revision)
    }

    /// Loads a revision together with its raw record.
    ///
    /// The record also holds the snapshot fields written by the owner under
    /// the revision id.
    pub(crate) fn load_record(&self, id: &str) -> CoreResult<(Revision, HashMap<String, String>)> {
        let record = self.store.hget_all(id)?;
        if record.is_empty() {
            return Err(CoreError::not_found(EntityKind::Revision, id));
        }
        let revision = parse_record(id, &record)?;
        Ok((revision, record))
    }

    /// Loads every revision of `owner_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Propagates the first revision that fails to load.
    pub fn history(&self, owner_id: &str) -> CoreResult<Vec<Revision>> {
        self.store
            .zrange(&keys::revisions(owner_id))?
            .into_iter()
            .map(|(id, _)| self.load_by_id(&id))
            .collect()
    }
}

impl std::fmt::Debug for RevisionStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionStore")
            .field("index", &self.config.revisions_index)
            .finish_non_exhaustive()
    }
}

fn parse_record(id: &str, record: &HashMap<String, String>) -> CoreResult<Revision> {
    let kind = record.get(TYPE).map(String::as_str).unwrap_or_default();
    if kind != EntityKind::Revision.as_str() {
        return Err(CoreError::type_mismatch(id, EntityKind::Revision, kind));
    }

    let when_text = record.get(WHEN).map(String::as_str).unwrap_or_default();
    let when = DateTime::parse_from_rfc3339(when_text)
        .map_err(|e| CoreError::decode(format!("revision {id} timestamp '{when_text}': {e}")))?
        .with_timezone(&Utc);

    let change_type = record
        .get(CHANGE_TYPE)
        .map(String::as_str)
        .unwrap_or_default()
        .parse()?;

    Ok(Revision {
        id: id.to_string(),
        message: record.get(MESSAGE).cloned(),
        when,
        change_type,
        parent: record.get(PARENT).filter(|p| !p.is_empty()).cloned(),
        object: record.get(OBJECT).cloned().unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::with_batch;
    use revdoc_storage::{InMemoryStore, WriteOp};

    fn ids() -> IdGenerator {
        IdGenerator::new(&Config::default()).unwrap()
    }

    #[test]
    fn create_starts_a_chain() {
        let rev = Revision::create("owner1", &ids());
        assert_eq!(rev.change_type, ChangeType::Create);
        assert_eq!(rev.parent, None);
        assert_eq!(rev.object, "owner1");
        assert_eq!(rev.id.len(), 32);
    }

    #[test]
    fn update_points_at_its_predecessor() {
        let ids = ids();
        let first = Revision::create("owner1", &ids);
        let second = Revision::update(&first, &ids);
        let third = Revision::update(&second, &ids);

        assert_eq!(second.change_type, ChangeType::Update);
        assert_eq!(second.parent.as_deref(), Some(first.id.as_str()));
        assert_eq!(third.parent.as_deref(), Some(second.id.as_str()));
        assert_eq!(third.object, "owner1");
        assert!(first.when < second.when && second.when < third.when);
    }

    #[test]
    fn update_is_after_a_parent_from_the_future() {
        let ids = ids();
        let mut parent = Revision::create("o", &ids);
        parent.when = Utc::now() + Duration::hours(1);
        let child = Revision::update(&parent, &ids);
        assert!(child.when > parent.when);
    }

    #[test]
    fn next_revision_only_chains_same_owner() {
        let ids = ids();
        let rev = Revision::create("a", &ids);
        assert_eq!(next_revision(Some(&rev), "a", &ids, None).change_type, ChangeType::Update);
        assert_eq!(next_revision(Some(&rev), "b", &ids, None).change_type, ChangeType::Create);
        assert_eq!(next_revision(None, "a", &ids, None).change_type, ChangeType::Create);

        let noted = next_revision(Some(&rev), "a", &ids, Some("fix typo"));
        assert_eq!(noted.message.as_deref(), Some("fix typo"));
        assert_eq!(noted.parent.as_deref(), Some(rev.id.as_str()));
    }

    #[test]
    fn save_then_load_roundtrip() {
        let store = InMemoryStore::new();
        let config = Config::default();
        let revisions = RevisionStore::new(&store, &config);
        let rev = Revision::create("owner1", &ids()).with_message("initial import");

        with_batch(&store, |batch| {
            revisions.save(&rev, batch);
            Ok(())
        })
        .unwrap();

        let loaded = revisions.load_by_id(&rev.id).unwrap();
        assert_eq!(loaded, rev);
        assert_eq!(
            store.zrange("revisions").unwrap(),
            vec![(rev.id.clone(), rev.score())]
        );
    }

    #[test]
    fn missing_revision_is_not_found() {
        let store = InMemoryStore::new();
        let config = Config::default();
        let err = RevisionStore::new(&store, &config)
            .load_by_id("deadbeef")
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { kind: EntityKind::Revision, .. }));
    }

    #[test]
    fn other_record_type_is_mismatch() {
        let store = InMemoryStore::new();
        store
            .execute(vec![WriteOp::hset("abc", "type", "doctype")])
            .unwrap();
        let config = Config::default();
        let err = RevisionStore::new(&store, &config)
            .load_by_id("abc")
            .unwrap_err();
        assert!(matches!(err, CoreError::TypeMismatch { .. }));
    }

    #[test]
    fn malformed_timestamp_is_decode_error() {
        let store = InMemoryStore::new();
        store
            .execute(vec![
                WriteOp::hset("r1", "type", "revision"),
                WriteOp::hset("r1", "when", "yesterday"),
                WriteOp::hset("r1", "change_type", "create"),
            ])
            .unwrap();
        let config = Config::default();
        let err = RevisionStore::new(&store, &config)
            .load_by_id("r1")
            .unwrap_err();
        assert!(matches!(err, CoreError::Decode { .. }));
    }

    #[test]
    fn history_is_chronological() {
        let store = InMemoryStore::new();
        let config = Config::default();
        let revisions = RevisionStore::new(&store, &config);
        let ids = ids();

        let mut chain = vec![Revision::create("o", &ids)];
        for _ in 0..4 {
            let next = Revision::update(chain.last().unwrap(), &ids);
            chain.push(next);
        }
        for rev in &chain {
            with_batch(&store, |batch| {
                revisions.save(rev, batch);
                Ok(())
            })
            .unwrap();
        }

        let history = revisions.history("o").unwrap();
        assert_eq!(history, chain);
    }

    #[test]
    fn timestamp_text_is_fixed_width_utc() {
        let rev = Revision::create("o", &ids());
        let text = rev.when_text();
        assert!(text.ends_with('Z'));
        assert_eq!(text.len(), "2024-01-01T00:00:00.000000000Z".len());
    }
}
