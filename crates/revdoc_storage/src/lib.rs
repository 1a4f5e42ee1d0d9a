//! # revdoc Storage
//!
//! Key-value store trait and implementations for revdoc.
//!
//! This crate provides the lowest-level storage abstraction for revdoc.
//! Stores expose a small set of **key-value primitives** and do not
//! interpret the keys or values they hold:
//!
//! - hash maps: get a field, get all fields, set a field, set-if-absent,
//!   delete a field
//! - sets: add a member, list members
//! - sorted sets: add a member with a score, range by score
//!
//! ## Design Principles
//!
//! - Writes are queued as [`WriteOp`]s and submitted together through
//!   [`KeyValueStore::execute`], one round trip per batch
//! - Reads are individual round trips, never batched
//! - Stores must be `Send + Sync` for concurrent access
//! - revdoc owns all key layout interpretation
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral storage
//!
//! ## Example
//!
//! ```rust
//! use revdoc_storage::{InMemoryStore, KeyValueStore, WriteOp};
//!
//! let store = InMemoryStore::new();
//! store
//!     .execute(vec![WriteOp::hset("page", "title", "Hello")])
//!     .unwrap();
//! assert_eq!(store.hget("page", "title").unwrap().as_deref(), Some("Hello"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod command;
mod error;
mod memory;

pub use backend::KeyValueStore;
pub use command::WriteOp;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
