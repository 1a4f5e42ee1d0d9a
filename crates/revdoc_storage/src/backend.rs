//! Key-value store trait definition.

use crate::command::WriteOp;
use crate::error::StorageResult;
use std::collections::HashMap;

/// A key-value store backing revdoc.
///
/// Stores expose hash, set and sorted-set primitives over string keys.
/// revdoc owns the key layout; stores do not know what a doctype, a
/// document or a revision is.
///
/// # Invariants
///
/// - `execute` applies the commands of one batch in submission order, without
///   interleaving commands from other batches. It is not required to be
///   all-or-nothing: a failure may leave a prefix of the batch applied.
/// - Every read method is an independent round trip. Two reads may observe
///   different states if a batch is applied between them.
/// - `hset_nx` is atomic with respect to every other command.
/// - Reading a missing key returns the empty value for its kind, not an error.
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
pub trait KeyValueStore: Send + Sync {
    /// Returns one field of the hash at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` holds a value that is not a hash, or if the
    /// store cannot be reached.
    fn hget(&self, key: &str, field: &str) -> StorageResult<Option<String>>;

    /// Returns every field of the hash at `key`.
    ///
    /// A missing key yields an empty map.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` holds a value that is not a hash, or if the
    /// store cannot be reached.
    fn hget_all(&self, key: &str) -> StorageResult<HashMap<String, String>>;

    /// Sets `field` of the hash at `key` only if the field is absent.
    ///
    /// Returns `true` if the value was written. This is applied immediately,
    /// outside of any batch.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` holds a value that is not a hash, or if the
    /// store cannot be reached.
    fn hset_nx(&self, key: &str, field: &str, value: &str) -> StorageResult<bool>;

    /// Removes `field` from the hash at `key`.
    ///
    /// Returns `true` if the field existed. Applied immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` holds a value that is not a hash, or if the
    /// store cannot be reached.
    fn hdel(&self, key: &str, field: &str) -> StorageResult<bool>;

    /// Returns the members of the set at `key` in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` holds a value that is not a set, or if the
    /// store cannot be reached.
    fn smembers(&self, key: &str) -> StorageResult<Vec<String>>;

    /// Returns the members of the sorted set at `key`, lowest score first.
    ///
    /// Members with equal scores are ordered lexicographically.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` holds a value that is not a sorted set, or if
    /// the store cannot be reached.
    fn zrange(&self, key: &str) -> StorageResult<Vec<(String, f64)>>;

    /// Applies a batch of write commands in one round trip.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be applied. Commands before
    /// the failing one may already be applied.
    fn execute(&self, ops: Vec<WriteOp>) -> StorageResult<()>;
}
