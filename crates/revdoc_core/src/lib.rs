//! # revdoc Core
//!
//! Schema-versioned document store for revdoc.
//!
//! This crate provides:
//! - Doctypes: named schemas made of typed fields
//! - Documents: instances of data conforming to a doctype
//! - Revisions: an immutable, timestamped record of every save
//! - The key layout mapping all of the above onto hash, set and sorted-set
//!   primitives of a [`KeyValueStore`](revdoc_storage::KeyValueStore)
//!
//! Every save is queued into a single [`Batch`] and applied in one round trip.
//! Reads are individual round trips and are **not isolated** from concurrent
//! writers: a document load resolves its doctype, its revision and its values
//! separately, so a save landing between those reads can yield a mix of old
//! and new state.
//!
//! ## Example
//!
//! ```rust
//! use revdoc_core::{DocStore, Document, DoctypeBuilder};
//! use revdoc_storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! let store = DocStore::open(Arc::new(InMemoryStore::new())).unwrap();
//!
//! let mut page = DoctypeBuilder::new("page", "Page")
//!     .field("title", "Title", "string")
//!     .build();
//! store.save_doctype(&mut page).unwrap();
//!
//! let mut doc = Document::new("my-first-page", "page");
//! doc.set("title", "My First Page");
//! store.save_document(&mut doc).unwrap();
//!
//! let loaded = store.load_document(doc.id.as_deref().unwrap()).unwrap();
//! assert_eq!(loaded.get("title").and_then(|v| v.as_str()), Some("My First Page"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod doctype;
mod document;
mod error;
mod field;
mod id;
pub mod keys;
mod registry;
mod revision;
mod schema;
mod store;
mod types;
pub mod value;

pub use batch::{with_batch, Batch};
pub use config::Config;
pub use doctype::{Doctype, DoctypeStore};
pub use document::{Document, DocumentStore};
pub use error::{CoreError, CoreResult};
pub use field::{Field, FieldStore};
pub use id::{IdGenerator, IdKind};
pub use registry::DoctypeRegistry;
pub use revision::{Revision, RevisionStore};
pub use schema::{DoctypeBuilder, SchemaBuilder};
pub use store::DocStore;
pub use types::{ChangeType, EntityKind};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
