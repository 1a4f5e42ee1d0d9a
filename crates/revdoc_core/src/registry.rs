//! Registry of known doctypes.

use crate::doctype::Doctype;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// An in-process cache of doctypes keyed by code.
///
/// The registry is populated at startup, read by document saves to avoid a
/// store round trip per save, and invalidated whenever a doctype is saved
/// through the owning [`DocStore`](crate::DocStore). It is an explicit value,
/// owned by whoever needs it; there is no process-wide registry.
#[derive(Debug, Default)]
pub struct DoctypeRegistry {
    doctypes: RwLock<HashMap<String, Arc<Doctype>>>,
}

impl DoctypeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a doctype, keyed by its code.
    pub fn insert(&self, doctype: Arc<Doctype>) {
        self.doctypes.write().insert(doctype.code.clone(), doctype);
    }

    /// Returns the doctype registered under `code`.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<Arc<Doctype>> {
        self.doctypes.read().get(code).cloned()
    }

    /// Returns `true` if a doctype is registered under `code`.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.doctypes.read().contains_key(code)
    }

    /// Drops the doctype registered under `code`.
    ///
    /// Returns the dropped doctype, if any.
    pub fn invalidate(&self, code: &str) -> Option<Arc<Doctype>> {
        self.doctypes.write().remove(code)
    }

    /// Drops `doctype` under its code and any entry sharing its id.
    ///
    /// Returns the number of dropped entries. A renamed doctype is still
    /// registered under its old code until this runs.
    pub fn invalidate_doctype(&self, doctype: &Doctype) -> usize {
        let mut doctypes = self.doctypes.write();
        let before = doctypes.len();
        doctypes.retain(|code, entry| {
            *code != doctype.code && (doctype.id.is_none() || entry.id != doctype.id)
        });
        before - doctypes.len()
    }

    /// Drops every doctype.
    pub fn clear(&self) {
        self.doctypes.write().clear();
    }

    /// Returns the registered codes in lexicographic order.
    #[must_use]
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.doctypes.read().keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Returns the number of registered doctypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.doctypes.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doctypes.read().is_empty()
    }
}
