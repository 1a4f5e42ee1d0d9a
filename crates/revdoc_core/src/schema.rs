//! Schema builders.
//!
//! A [`SchemaBuilder`] describes a doctype's fields without touching the
//! store. Types can implement it by hand (or through a derive macro kept
//! outside this crate); [`DoctypeBuilder`] is a ready-made implementor with a
//! fluent API.
//!
//! ```rust
//! use revdoc_core::{Field, SchemaBuilder};
//!
//! struct Article;
//!
//! impl SchemaBuilder for Article {
//!     fn code(&self) -> String {
//!         "article".into()
//!     }
//!
//!     fn verbose_name(&self) -> String {
//!         "Article".into()
//!     }
//!
//!     fn fields(&self) -> Vec<Field> {
//!         vec![
//!             Field::new("headline", "Headline", ["string"]),
//!             Field::new("authors", "Authors", ["author"]).multiple(),
//!         ]
//!     }
//! }
//!
//! let doctype = Article.build();
//! assert_eq!(doctype.fields.len(), 2);
//! ```

use crate::doctype::Doctype;
use crate::field::Field;

/// Produces the definition of a doctype.
pub trait SchemaBuilder {
    /// Public code of the doctype.
    fn code(&self) -> String;

    /// Human title of the doctype.
    fn verbose_name(&self) -> String;

    /// Field definitions, each carrying its own code.
    fn fields(&self) -> Vec<Field>;

    /// Builds an unsaved doctype from this definition.
    fn build(&self) -> Doctype {
        let mut doctype = Doctype::new(self.code(), self.verbose_name());
        for field in self.fields() {
            doctype.add_field(field);
        }
        doctype
    }
}

/// A fluent [`SchemaBuilder`].
#[derive(Debug, Clone)]
pub struct DoctypeBuilder {
    code: String,
    verbose_name: String,
    fields: Vec<Field>,
}

impl DoctypeBuilder {
    /// Starts a doctype definition.
    pub fn new(code: impl Into<String>, verbose_name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            verbose_name: verbose_name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a single-valued field of type `type_tag`.
    #[must_use]
    pub fn field(mut self, code: &str, verbose_name: &str, type_tag: &str) -> Self {
        self.fields.push(Field::new(code, verbose_name, [type_tag]));
        self
    }

    /// Adds a multi-valued field of type `type_tag`.
    #[must_use]
    pub fn multi_field(mut self, code: &str, verbose_name: &str, type_tag: &str) -> Self {
        self.fields
            .push(Field::new(code, verbose_name, [type_tag]).multiple());
        self
    }

    /// Adds a prepared field.
    #[must_use]
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Builds the doctype.
    #[must_use]
    pub fn build(&self) -> Doctype {
        SchemaBuilder::build(self)
    }
}

impl SchemaBuilder for DoctypeBuilder {
    fn code(&self) -> String {
        self.code.clone()
    }

    fn verbose_name(&self) -> String {
        self.verbose_name.clone()
    }

    fn fields(&self) -> Vec<Field> {
        self.fields.clone()
    }
}
