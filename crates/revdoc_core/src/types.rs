//! Core type definitions for revdoc.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of entity stored by revdoc.
///
/// The textual form is the `type` marker written on every base record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A schema definition.
    Doctype,
    /// One field of a schema.
    Field,
    /// A document instance.
    Document,
    /// An immutable revision record.
    Revision,
}

impl EntityKind {
    /// Returns the type marker stored on base records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Doctype => "doctype",
            Self::Field => "field",
            Self::Document => "document",
            Self::Revision => "revision",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of change a revision records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// First save of an entity.
    Create,
    /// A later save of an entity.
    Update,
}

impl ChangeType {
    /// Returns the stored textual form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            other => Err(CoreError::decode(format!("unknown change type '{other}'"))),
        }
    }
}
