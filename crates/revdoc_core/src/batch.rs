//! Batched writes.
//!
//! A top-level save queues every write it needs into one [`Batch`] and the
//! batch is applied by [`with_batch`] in a single round trip. Reads are never
//! part of a batch.

use crate::error::{CoreError, CoreResult};
use revdoc_storage::{KeyValueStore, WriteOp};

/// An index entry claimed ahead of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Claim {
    index: String,
    key: String,
}

/// An ordered group of write commands.
///
/// Commands keep their submission order when applied. Besides queued writes,
/// a batch remembers index entries claimed for it with an atomic
/// set-if-absent, so they can be released if the batch is never applied.
#[derive(Debug, Default)]
pub struct Batch {
    ops: Vec<WriteOp>,
    claims: Vec<Claim>,
}

impl Batch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a hash field write.
    pub fn hset(&mut self, key: impl Into<String>, field: impl Into<String>, value: impl Into<String>) {
        self.ops.push(WriteOp::hset(key, field, value));
    }

    /// Queues a hash field removal.
    pub fn hdel(&mut self, key: impl Into<String>, field: impl Into<String>) {
        self.ops.push(WriteOp::hdel(key, field));
    }

    /// Queues a set member addition.
    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) {
        self.ops.push(WriteOp::sadd(key, member));
    }

    /// Queues a sorted set member addition.
    pub fn zadd(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) {
        self.ops.push(WriteOp::zadd(key, member, score));
    }

    /// Queues a key removal.
    pub fn del(&mut self, key: impl Into<String>) {
        self.ops.push(WriteOp::del(key));
    }

    /// Records an index entry claimed on behalf of this batch.
    pub fn record_claim(&mut self, index: impl Into<String>, key: impl Into<String>) {
        self.claims.push(Claim {
            index: index.into(),
            key: key.into(),
        });
    }

    /// Returns the queued commands.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Returns the number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if no command is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies every queued command in one round trip.
    ///
    /// On failure the claims recorded by this batch are released. The store
    /// does not roll back, so a failed batch may leave a prefix of its
    /// commands applied, including records that still name a released code
    /// or slug. Such records are unreachable through the index and a later
    /// save may claim the key again.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Persistence`] if the store rejects the batch.
    pub fn execute(mut self, store: &dyn KeyValueStore) -> CoreResult<usize> {
        let ops = std::mem::take(&mut self.ops);
        let count = ops.len();
        match store.execute(ops) {
            Ok(()) => {
                tracing::debug!(ops = count, "batch applied");
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(ops = count, error = %e, "batch failed");
                self.release_claims(store);
                Err(CoreError::Persistence(e))
            }
        }
    }

    /// Drops every queued command and releases the recorded claims.
    pub fn discard(mut self, store: &dyn KeyValueStore) {
        tracing::debug!(ops = self.ops.len(), "batch discarded");
        self.ops.clear();
        self.release_claims(store);
    }

    fn release_claims(&mut self, store: &dyn KeyValueStore) {
        for claim in self.claims.drain(..) {
            if let Err(e) = store.hdel(&claim.index, &claim.key) {
                tracing::warn!(
                    index = %claim.index,
                    key = %claim.key,
                    error = %e,
                    "failed to release index claim"
                );
            }
        }
    }
}

/// Runs `f` inside a batch scope.
///
/// If `f` returns `Ok`, the batch is applied once and the result returned.
/// If `f` returns `Err`, nothing is applied. Claims recorded by `f` are
/// released whenever the batch is not applied successfully.
///
/// # Errors
///
/// Returns the error of `f`, or [`CoreError::Persistence`] if the batch
/// fails at the store.
pub fn with_batch<F, T>(store: &dyn KeyValueStore, f: F) -> CoreResult<T>
where
    F: FnOnce(&mut Batch) -> CoreResult<T>,
{
    let mut batch = Batch::new();
    match f(&mut batch) {
        Ok(result) => {
            batch.execute(store)?;
            Ok(result)
        }
        Err(e) => {
            batch.discard(store);
            Err(e)
        }
    }
}
