//! Fault injection.
//!
//! [`FaultyStore`] wraps an [`InMemoryStore`] and fails batches or reads on
//! demand, so tests can check that a failed save leaves no trace.

use revdoc_storage::{InMemoryStore, KeyValueStore, StorageError, StorageResult, WriteOp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A key-value store that fails on request.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    failing_batches: AtomicUsize,
    partial_ops: AtomicUsize,
    reads_down: AtomicBool,
    batches_applied: AtomicUsize,
}

impl FaultyStore {
    /// Creates a store that does not fail yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` batches without applying them.
    pub fn fail_next_batches(&self, count: usize) {
        self.partial_ops.store(0, Ordering::SeqCst);
        self.failing_batches.store(count, Ordering::SeqCst);
    }

    /// Fails the next batch after applying its first `ops` commands.
    pub fn fail_next_batch_after(&self, ops: usize) {
        self.partial_ops.store(ops, Ordering::SeqCst);
        self.failing_batches.store(1, Ordering::SeqCst);
    }

    /// Makes every read fail with a connection error until restored.
    pub fn set_reads_down(&self, down: bool) {
        self.reads_down.store(down, Ordering::SeqCst);
    }

    /// Returns the number of batches applied in full.
    pub fn batches_applied(&self) -> usize {
        self.batches_applied.load(Ordering::SeqCst)
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    fn check_reads(&self) -> StorageResult<()> {
        if self.reads_down.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("injected read failure".to_string()));
        }
        Ok(())
    }

    fn take_batch_failure(&self) -> bool {
        self.failing_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl KeyValueStore for FaultyStore {
    fn hget(&self, key: &str, field: &str) -> StorageResult<Option<String>> {
        self.check_reads()?;
        self.inner.hget(key, field)
    }

    fn hget_all(&self, key: &str) -> StorageResult<HashMap<String, String>> {
        self.check_reads()?;
        self.inner.hget_all(key)
    }

    fn hset_nx(&self, key: &str, field: &str, value: &str) -> StorageResult<bool> {
        self.inner.hset_nx(key, field, value)
    }

    fn hdel(&self, key: &str, field: &str) -> StorageResult<bool> {
        self.inner.hdel(key, field)
    }

    fn smembers(&self, key: &str) -> StorageResult<Vec<String>> {
        self.check_reads()?;
        self.inner.smembers(key)
    }

    fn zrange(&self, key: &str) -> StorageResult<Vec<(String, f64)>> {
        self.check_reads()?;
        self.inner.zrange(key)
    }

    fn execute(&self, mut ops: Vec<WriteOp>) -> StorageResult<()> {
        if !self.take_batch_failure() {
            self.inner.execute(ops)?;
            self.batches_applied.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        let total = ops.len();
        let applied = self.partial_ops.swap(0, Ordering::SeqCst).min(total);
        ops.truncate(applied);
        if !ops.is_empty() {
            self.inner.execute(ops)?;
        }
        tracing::debug!(ops = total, applied, "injected batch failure");
        Err(StorageError::BatchFailed {
            ops: total,
            reason: "injected failure".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fails_requested_batches_only() {
        let store = FaultyStore::new();
        store.fail_next_batches(1);

        let result = store.execute(vec![WriteOp::hset("a", "f", "1")]);
        assert!(matches!(result, Err(StorageError::BatchFailed { ops: 1, .. })));
        assert_eq!(store.hget("a", "f").unwrap(), None);

        store.execute(vec![WriteOp::hset("a", "f", "1")]).unwrap();
        assert_eq!(store.hget("a", "f").unwrap().as_deref(), Some("1"));
        assert_eq!(store.batches_applied(), 1);
    }

    #[test]
    fn partial_failure_applies_a_prefix() {
        let store = FaultyStore::new();
        store.fail_next_batch_after(1);

        let result = store.execute(vec![WriteOp::hset("a", "f", "1"), WriteOp::hset("b", "f", "2")]);
        assert!(result.is_err());
        assert!(store.hget("a", "f").unwrap().is_some());
        assert_eq!(store.hget("b", "f").unwrap(), None);
    }

    #[test]
    fn reads_can_go_down() {
        let store = FaultyStore::new();
        store.set_reads_down(true);
        assert!(matches!(store.hget_all("a"), Err(StorageError::Connection(_))));
        store.set_reads_down(false);
        assert!(store.hget_all("a").unwrap().is_empty());
    }
}
