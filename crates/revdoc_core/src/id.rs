//! Identifier generation.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use rand::rngs::OsRng;
use rand::RngCore;

/// Kind of identifier to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Doctype identifier.
    Doctype,
    /// Field identifier, unique within its doctype.
    Field,
    /// Document identifier.
    Document,
    /// Revision identifier.
    Revision,
}

/// Generates random hex identifiers from the OS entropy source.
///
/// The entropy source is checked once by [`IdGenerator::new`]. A store that
/// cannot read it must not start: identifiers are never generated from a
/// weaker source.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    doctype_bytes: usize,
    field_bytes: usize,
    document_bytes: usize,
    revision_bytes: usize,
}

impl IdGenerator {
    /// Creates a generator sized by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntropyUnavailable`] if the OS entropy source
    /// cannot be read.
    pub fn new(config: &Config) -> CoreResult<Self> {
        let mut sample = [0u8; 8];
        OsRng
            .try_fill_bytes(&mut sample)
            .map_err(|e| CoreError::EntropyUnavailable {
                message: e.to_string(),
            })?;

        Ok(Self {
            doctype_bytes: config.doctype_id_bytes,
            field_bytes: config.field_id_bytes,
            document_bytes: config.document_id_bytes,
            revision_bytes: config.revision_id_bytes,
        })
    }

    /// Generates an identifier for `kind`.
    #[must_use]
    pub fn generate(&self, kind: IdKind) -> String {
        let len = match kind {
            IdKind::Doctype => self.doctype_bytes,
            IdKind::Field => self.field_bytes,
            IdKind::Document => self.document_bytes,
            IdKind::Revision => self.revision_bytes,
        };
        Self::generate_hex(len)
    }

    /// Reads `byte_len` random bytes and returns them hex encoded.
    #[must_use]
    pub fn generate_hex(byte_len: usize) -> String {
        let mut bytes = vec![0u8; byte_len];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_length_is_twice_byte_length() {
        assert_eq!(IdGenerator::generate_hex(8).len(), 16);
        assert_eq!(IdGenerator::generate_hex(0), "");
    }

    #[test]
    fn generated_ids_are_lowercase_hex() {
        let id = IdGenerator::generate_hex(16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn lengths_follow_config() {
        let config = Config::new().field_id_bytes(4).revision_id_bytes(20);
        let ids = IdGenerator::new(&config).unwrap();

        assert_eq!(ids.generate(IdKind::Field).len(), 8);
        assert_eq!(ids.generate(IdKind::Revision).len(), 40);
        assert_eq!(ids.generate(IdKind::Doctype).len(), 16);
        assert_eq!(ids.generate(IdKind::Document).len(), 24);
    }

    #[test]
    fn new_is_unique() {
        let ids = IdGenerator::new(&Config::default()).unwrap();
        let a = ids.generate(IdKind::Revision);
        let b = ids.generate(IdKind::Revision);
        assert_ne!(a, b);
    }
}
