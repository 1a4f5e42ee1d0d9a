//! Write commands queued into a batch.

/// A single write command.
///
/// Commands are queued in submission order and applied by
/// [`KeyValueStore::execute`](crate::KeyValueStore::execute) in that order.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Sets `field` of the hash at `key` to `value`.
    HSet {
        /// Hash key.
        key: String,
        /// Field name within the hash.
        field: String,
        /// Value to store.
        value: String,
    },
    /// Removes `field` from the hash at `key`.
    HDel {
        /// Hash key.
        key: String,
        /// Field name within the hash.
        field: String,
    },
    /// Adds `member` to the set at `key`.
    SAdd {
        /// Set key.
        key: String,
        /// Member to add.
        member: String,
    },
    /// Adds `member` to the sorted set at `key` with `score`.
    ///
    /// Re-adding an existing member updates its score.
    ZAdd {
        /// Sorted set key.
        key: String,
        /// Member to add.
        member: String,
        /// Ordering score.
        score: f64,
    },
    /// Removes the value at `key`, whatever its kind.
    Del {
        /// Key to remove.
        key: String,
    },
}

impl WriteOp {
    /// Creates a hash set command.
    pub fn hset(key: impl Into<String>, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::HSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a hash field delete command.
    pub fn hdel(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::HDel {
            key: key.into(),
            field: field.into(),
        }
    }

    /// Creates a set add command.
    pub fn sadd(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SAdd {
            key: key.into(),
            member: member.into(),
        }
    }

    /// Creates a sorted set add command.
    pub fn zadd(key: impl Into<String>, member: impl Into<String>, score: f64) -> Self {
        Self::ZAdd {
            key: key.into(),
            member: member.into(),
            score,
        }
    }

    /// Creates a delete command.
    pub fn del(key: impl Into<String>) -> Self {
        Self::Del { key: key.into() }
    }

    /// Returns the key this command writes to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::HSet { key, .. }
            | Self::HDel { key, .. }
            | Self::SAdd { key, .. }
            | Self::ZAdd { key, .. }
            | Self::Del { key } => key,
        }
    }
}
