//! Store configuration.

use crate::error::{CoreError, CoreResult};

/// Shortest identifier, in random bytes, accepted for any entity kind.
pub const MIN_ID_BYTES: usize = 4;

/// Configuration for opening a [`DocStore`](crate::DocStore).
///
/// Identifier lengths are given in random bytes; the stored identifier is
/// twice as many hex characters. Collisions are never detected, so lengths
/// must keep them negligible for the expected size of each namespace. Field
/// identifiers only need to be unique within their doctype.
#[derive(Debug, Clone)]
pub struct Config {
    /// Random bytes per doctype identifier.
    pub doctype_id_bytes: usize,

    /// Random bytes per field identifier.
    pub field_id_bytes: usize,

    /// Random bytes per document identifier.
    pub document_id_bytes: usize,

    /// Random bytes per revision identifier.
    pub revision_id_bytes: usize,

    /// Key of the global chronological revision index (sorted set).
    pub revisions_index: String,

    /// Key of the doctype code to identifier index (hash).
    pub doctype_index: String,

    /// Key of the document slug to identifier index (hash).
    pub document_index: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            doctype_id_bytes: 8,
            field_id_bytes: 6,
            document_id_bytes: 12,
            revision_id_bytes: 16,
            revisions_index: "revisions".to_string(),
            doctype_index: "doctypes".to_string(),
            document_index: "documents".to_string(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets random bytes per doctype identifier.
    #[must_use]
    pub const fn doctype_id_bytes(mut self, bytes: usize) -> Self {
        self.doctype_id_bytes = bytes;
        self
    }

    /// Sets random bytes per field identifier.
    #[must_use]
    pub const fn field_id_bytes(mut self, bytes: usize) -> Self {
        self.field_id_bytes = bytes;
        self
    }

    /// Sets random bytes per document identifier.
    #[must_use]
    pub const fn document_id_bytes(mut self, bytes: usize) -> Self {
        self.document_id_bytes = bytes;
        self
    }

    /// Sets random bytes per revision identifier.
    #[must_use]
    pub const fn revision_id_bytes(mut self, bytes: usize) -> Self {
        self.revision_id_bytes = bytes;
        self
    }

    /// Sets the key prefix shared by the three global indices.
    ///
    /// Useful to keep several stores apart inside one backend.
    #[must_use]
    pub fn index_namespace(mut self, namespace: &str) -> Self {
        self.revisions_index = crate::keys::compose([namespace, "revisions"]);
        self.doctype_index = crate::keys::compose([namespace, "doctypes"]);
        self.document_index = crate::keys::compose([namespace, "documents"]);
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if an identifier length is below
    /// [`MIN_ID_BYTES`] or an index key is empty.
    pub fn validate(&self) -> CoreResult<()> {
        let lengths = [
            ("doctype", self.doctype_id_bytes),
            ("field", self.field_id_bytes),
            ("document", self.document_id_bytes),
            ("revision", self.revision_id_bytes),
        ];
        for (kind, bytes) in lengths {
            if bytes < MIN_ID_BYTES {
                return Err(CoreError::invalid_config(format!(
                    "{kind} identifiers need at least {MIN_ID_BYTES} bytes, got {bytes}"
                )));
            }
        }

        for key in [&self.revisions_index, &self.doctype_index, &self.document_index] {
            if key.is_empty() {
                return Err(CoreError::invalid_config("index keys must not be empty"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.revision_id_bytes, 16);
        assert_eq!(config.doctype_index, "doctypes");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .document_id_bytes(16)
            .field_id_bytes(4)
            .index_namespace("tenant-a");

        assert_eq!(config.document_id_bytes, 16);
        assert_eq!(config.field_id_bytes, 4);
        assert_eq!(config.document_index, "tenant-a/documents");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn short_identifiers_are_rejected() {
        let config = Config::new().revision_id_bytes(2);
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }
}
