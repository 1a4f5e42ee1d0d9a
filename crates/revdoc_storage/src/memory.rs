//! In-memory key-value store for testing.

use crate::backend::KeyValueStore;
use crate::command::WriteOp;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// A value held at one key.
#[derive(Debug, Clone)]
enum Entry {
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    Sorted(HashMap<String, f64>),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
            Self::Sorted(_) => "sorted set",
        }
    }
}

/// An in-memory key-value store.
///
/// This store keeps all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// The store is thread-safe and can be shared across threads. A batch is
/// applied under a single write lock, so commands of one batch never
/// interleave with commands of another.
///
/// # Example
///
/// ```rust
/// use revdoc_storage::{InMemoryStore, KeyValueStore, WriteOp};
///
/// let store = InMemoryStore::new();
/// store.execute(vec![WriteOp::sadd("tags", "rust")]).unwrap();
/// assert_eq!(store.smembers("tags").unwrap(), vec!["rust".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<String, Entry>>,
    closed: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if no key holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns all keys in lexicographic order.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Clears all data from the store.
    pub fn clear(&self) {
        self.data.write().clear();
    }

    /// Closes the store. Every later command fails with [`StorageError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn apply(data: &mut HashMap<String, Entry>, op: WriteOp) -> StorageResult<()> {
        match op {
            WriteOp::HSet { key, field, value } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| Entry::Hash(HashMap::new()));
                match entry {
                    Entry::Hash(hash) => {
                        hash.insert(field, value);
                        Ok(())
                    }
                    _ => Err(StorageError::wrong_type(key, "hash")),
                }
            }
            WriteOp::HDel { key, field } => {
                let now_empty = match data.get_mut(&key) {
                    None => return Ok(()),
                    Some(Entry::Hash(hash)) => {
                        hash.remove(&field);
                        hash.is_empty()
                    }
                    Some(_) => return Err(StorageError::wrong_type(key, "hash")),
                };
                if now_empty {
                    data.remove(&key);
                }
                Ok(())
            }
            WriteOp::SAdd { key, member } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| Entry::Set(BTreeSet::new()));
                match entry {
                    Entry::Set(set) => {
                        set.insert(member);
                        Ok(())
                    }
                    _ => Err(StorageError::wrong_type(key, "set")),
                }
            }
            WriteOp::ZAdd { key, member, score } => {
                let entry = data
                    .entry(key.clone())
                    .or_insert_with(|| Entry::Sorted(HashMap::new()));
                match entry {
                    Entry::Sorted(sorted) => {
                        sorted.insert(member, score);
                        Ok(())
                    }
                    _ => Err(StorageError::wrong_type(key, "sorted set")),
                }
            }
            WriteOp::Del { key } => {
                data.remove(&key);
                Ok(())
            }
        }
    }
}

impl KeyValueStore for InMemoryStore {
    fn hget(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        self.ensure_open()?;
        match self.data.read().get(key) {
            None => Ok(None),
            Some(Entry::Hash(hash)) => Ok(hash.get(field).cloned()),
            Some(_) => Err(StorageError::wrong_type(key, "hash")),
        }
    }

    fn hget_all(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        self.ensure_open()?;
        match self.data.read().get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(StorageError::wrong_type(key, "hash")),
        }
    }

    fn hset_nx(&self, key: &str, field: &str, value: &str) -> StorageResult<bool> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(hash) => {
                if hash.contains_key(field) {
                    Ok(false)
                } else {
                    hash.insert(field.to_string(), value.to_string());
                    Ok(true)
                }
            }
            _ => Err(StorageError::wrong_type(key, "hash")),
        }
    }

    fn hdel(&self, key: &str, field: &str) -> StorageResult<bool> {
        self.ensure_open()?;
        let mut data = self.data.write();
        let removed = match data.get_mut(key) {
            None => return Ok(false),
            Some(Entry::Hash(hash)) => hash.remove(field).is_some(),
            Some(_) => return Err(StorageError::wrong_type(key, "hash")),
        };
        if matches!(data.get(key), Some(Entry::Hash(hash)) if hash.is_empty()) {
            data.remove(key);
        }
        Ok(removed)
    }

    fn smembers(&self, key: &str) -> StorageResult<Vec<String>> {
        self.ensure_open()?;
        match self.data.read().get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(StorageError::wrong_type(key, "set")),
        }
    }

    fn zrange(&self, key: &str) -> StorageResult<Vec<(String, f64)>> {
        self.ensure_open()?;
        match self.data.read().get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Sorted(sorted)) => {
                let mut members: Vec<(String, f64)> =
                    sorted.iter().map(|(m, s)| (m.clone(), *s)).collect();
                members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
                Ok(members)
            }
            Some(other) => {
                tracing::trace!(key, kind = other.kind(), "zrange on non sorted set");
                Err(StorageError::wrong_type(key, "sorted set"))
            }
        }
    }

    fn execute(&self, ops: Vec<WriteOp>) -> StorageResult<()> {
        self.ensure_open()?;
        let total = ops.len();
        tracing::trace!(ops = total, "applying batch");

        let mut data = self.data.write();
        for op in ops {
            Self::apply(&mut data, op).map_err(|e| StorageError::BatchFailed {
                ops: total,
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn missing_keys_read_as_empty() {
        let store = InMemoryStore::new();
        assert_eq!(store.hget("nope", "f").unwrap(), None);
        assert!(store.hget_all("nope").unwrap().is_empty());
        assert!(store.smembers("nope").unwrap().is_empty());
        assert!(store.zrange("nope").unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn hset_then_hget() {
        let store = InMemoryStore::new();
        store
            .execute(vec![
                WriteOp::hset("doc", "slug", "first"),
                WriteOp::hset("doc", "type", "document"),
            ])
            .unwrap();

        assert_eq!(store.hget("doc", "slug").unwrap().as_deref(), Some("first"));
        let all = store.hget_all("doc").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["type"], "document");
    }

    #[test]
    fn batch_applies_in_submission_order() {
        let store = InMemoryStore::new();
        store
            .execute(vec![
                WriteOp::sadd("fields", "a"),
                WriteOp::del("fields"),
                WriteOp::sadd("fields", "b"),
            ])
            .unwrap();

        assert_eq!(store.smembers("fields").unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn hset_nx_only_writes_once() {
        let store = InMemoryStore::new();
        assert!(store.hset_nx("doctypes", "page", "abc").unwrap());
        assert!(!store.hset_nx("doctypes", "page", "def").unwrap());
        assert_eq!(
            store.hget("doctypes", "page").unwrap().as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn batched_hdel_removes_field_and_empty_hash() {
        let store = InMemoryStore::new();
        store
            .execute(vec![
                WriteOp::hset("docs", "a", "1"),
                WriteOp::hset("docs", "b", "2"),
                WriteOp::hdel("docs", "a"),
                WriteOp::hdel("missing", "a"),
            ])
            .unwrap();
        assert_eq!(store.hget("docs", "a").unwrap(), None);
        assert_eq!(store.hget("docs", "b").unwrap().as_deref(), Some("2"));

        store.execute(vec![WriteOp::hdel("docs", "b")]).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn hdel_removes_field_and_empty_hash() {
        let store = InMemoryStore::new();
        store.hset_nx("doctypes", "page", "abc").unwrap();
        assert!(store.hdel("doctypes", "page").unwrap());
        assert!(!store.hdel("doctypes", "page").unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn zrange_orders_by_score_then_member() {
        let store = InMemoryStore::new();
        store
            .execute(vec![
                WriteOp::zadd("revs", "c", 2.0),
                WriteOp::zadd("revs", "b", 1.0),
                WriteOp::zadd("revs", "a", 2.0),
            ])
            .unwrap();

        let members: Vec<String> = store
            .zrange("revs")
            .unwrap()
            .into_iter()
            .map(|(m, _)| m)
            .collect();
        assert_eq!(members, vec!["b", "a", "c"]);
    }

    #[test]
    fn zadd_existing_member_updates_score() {
        let store = InMemoryStore::new();
        store
            .execute(vec![
                WriteOp::zadd("revs", "a", 5.0),
                WriteOp::zadd("revs", "b", 3.0),
                WriteOp::zadd("revs", "a", 1.0),
            ])
            .unwrap();

        let range = store.zrange("revs").unwrap();
        assert_eq!(range[0], ("a".to_string(), 1.0));
        assert_eq!(range.len(), 2);
    }

    #[test]
    fn wrong_type_fails_batch() {
        let store = InMemoryStore::new();
        store.execute(vec![WriteOp::sadd("k", "m")]).unwrap();

        let result = store.execute(vec![WriteOp::hset("k", "f", "v")]);
        assert!(matches!(result, Err(StorageError::BatchFailed { ops: 1, .. })));
        assert!(matches!(
            store.hget("k", "f"),
            Err(StorageError::WrongType { .. })
        ));
    }

    #[test]
    fn closed_store_rejects_commands() {
        let store = InMemoryStore::new();
        store.close();
        assert!(matches!(store.hget("k", "f"), Err(StorageError::Closed)));
        assert!(matches!(store.execute(vec![]), Err(StorageError::Closed)));
    }

    #[test]
    fn keys_are_sorted() {
        let store = InMemoryStore::new();
        store
            .execute(vec![WriteOp::sadd("b", "1"), WriteOp::sadd("a", "1")])
            .unwrap();
        assert_eq!(store.keys(), vec!["a", "b"]);
        store.clear();
        assert!(store.is_empty());
    }

    proptest! {
        #[test]
        fn smembers_is_sorted_and_deduplicated(members in prop::collection::vec("[a-z]{1,6}", 0..20)) {
            let store = InMemoryStore::new();
            let ops = members.iter().map(|m| WriteOp::sadd("s", m.as_str())).collect();
            store.execute(ops).unwrap();

            let mut expected: Vec<String> = members.clone();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(store.smembers("s").unwrap(), expected);
        }
    }
}
