//! Storage key layout.
//!
//! Every key is a `/`-separated path. Segments are not escaped, so codes,
//! slugs and identifiers must never contain the separator; the stores reject
//! such input before composing keys.
//!
//! | key | kind |
//! |---|---|
//! | `{id}` | hash, base record of a doctype, document or revision |
//! | `{scope}/fields` | set of field ids |
//! | `{scope}/field/{field}` | hash, field definition |
//! | `{scope}/field/{field}/expected_types` | sorted set, score = position |
//! | `{doctype}/field/{field}/revisions` | sorted set, field revisions by time |
//! | `{owner}/revisions` | sorted set, owner revisions by time |
//! | `{scope}/values` | hash, field id to serialized value |
//!
//! `scope` is either the owning entity's id (current state) or a revision id
//! (the snapshot written by that revision).

/// Separator between key segments.
pub const SEPARATOR: char = '/';

/// Joins segments with [`SEPARATOR`].
///
/// ```rust
/// assert_eq!(revdoc_core::keys::compose(["a1", "field", "f2"]), "a1/field/f2");
/// ```
pub fn compose<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut key = String::new();
    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            key.push(SEPARATOR);
        }
        key.push_str(segment.as_ref());
    }
    key
}

/// Returns `true` if `segment` can be used inside a key.
#[must_use]
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(SEPARATOR)
}

/// Set of field ids belonging to `scope`.
pub fn fields(scope: &str) -> String {
    compose([scope, "fields"])
}

/// Hash holding one field definition under `scope`.
pub fn field(scope: &str, field_id: &str) -> String {
    compose([scope, "field", field_id])
}

/// Sorted set of a field's expected type tags under `scope`.
pub fn expected_types(scope: &str, field_id: &str) -> String {
    compose([scope, "field", field_id, "expected_types"])
}

/// Chronological index of the revisions that touched a field.
pub fn field_revisions(doctype_id: &str, field_id: &str) -> String {
    compose([doctype_id, "field", field_id, "revisions"])
}

/// Chronological index of an owner's revisions.
pub fn revisions(owner_id: &str) -> String {
    compose([owner_id, "revisions"])
}

/// Hash of serialized document values under `scope`.
pub fn values(scope: &str) -> String {
    compose([scope, "values"])
}
