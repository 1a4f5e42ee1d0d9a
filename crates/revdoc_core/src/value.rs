//! Field value serialization.
//!
//! Document values are stored as text in a values hash keyed by field id.
//! A field's first expected type selects the serializer:
//!
//! | tag | value | stored as |
//! |---|---|---|
//! | `string` | JSON string | the string |
//! | `integer`, `int` | JSON integer (i64) | decimal |
//! | `float` | JSON number | shortest round-trip decimal |
//! | `boolean`, `bool` | JSON bool | `true` / `false` |
//! | `datetime` | RFC 3339 string | RFC 3339, UTC |
//! | any doctype code | document id string | the id |
//!
//! Fields with `multiple_values` hold a JSON array; each element goes through
//! the same serializer and the resulting strings are stored as one JSON array.
//! Tags that are neither a known scalar nor a plausible doctype code have no
//! serializer and fail with [`CoreError::UnsupportedFieldKind`]. Doctype
//! saves additionally require every reference tag to name a stored doctype
//! or the doctype being saved.

use crate::error::{CoreError, CoreResult};
use crate::field::Field;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};

/// How values of one type tag are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// UTF-8 text.
    String,
    /// Signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean.
    Boolean,
    /// UTC timestamp.
    DateTime,
    /// Identifier of a document of the named doctype.
    Reference(String),
}

impl ValueKind {
    /// Resolves a type tag.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedFieldKind`] if no serializer exists for
    /// `tag`.
    pub fn from_tag(field: &str, tag: &str) -> CoreResult<Self> {
        match tag {
            "string" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "datetime" => Ok(Self::DateTime),
            code if is_doctype_code(code) => Ok(Self::Reference(code.to_string())),
            other => Err(CoreError::unsupported_field_kind(field, other)),
        }
    }

    /// Serializes one value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidValue`] if `value` has the wrong shape.
    pub fn encode(&self, field: &str, value: &Value) -> CoreResult<String> {
        match (self, value) {
            (Self::String, Value::String(s)) => Ok(s.clone()),
            (Self::Integer, Value::Number(n)) if n.is_i64() => Ok(n.to_string()),
            (Self::Float, Value::Number(n)) => n
                .as_f64()
                .map(|f| f.to_string())
                .ok_or_else(|| CoreError::invalid_value(field, "a finite number")),
            (Self::Boolean, Value::Bool(b)) => Ok(b.to_string()),
            (Self::DateTime, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| format_datetime(&dt.with_timezone(&Utc)))
                .map_err(|_| CoreError::invalid_value(field, "an RFC 3339 timestamp")),
            (Self::Reference(_), Value::String(id)) if crate::keys::is_valid_segment(id) => {
                Ok(id.clone())
            }
            _ => Err(CoreError::invalid_value(field, self.describe())),
        }
    }

    /// Parses one stored value.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Decode`] if `raw` is not a valid encoding.
    pub fn decode(&self, field: &str, raw: &str) -> CoreResult<Value> {
        let malformed = || CoreError::decode(format!("field '{field}': malformed {} '{raw}'", self.describe()));
        match self {
            Self::String | Self::Reference(_) => Ok(Value::String(raw.to_string())),
            Self::Integer => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| malformed()),
            Self::Float => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(malformed),
            Self::Boolean => raw.parse::<bool>().map(Value::Bool).map_err(|_| malformed()),
            Self::DateTime => DateTime::parse_from_rfc3339(raw)
                .map(|dt| Value::String(format_datetime(&dt.with_timezone(&Utc))))
                .map_err(|_| malformed()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::String => "a string".to_string(),
            Self::Integer => "an integer".to_string(),
            Self::Float => "a number".to_string(),
            Self::Boolean => "a boolean".to_string(),
            Self::DateTime => "an RFC 3339 timestamp".to_string(),
            Self::Reference(code) => format!("the id of a '{code}' document"),
        }
    }
}

/// Resolves the serializer of `field` from its first expected type.
///
/// # Errors
///
/// Returns [`CoreError::UnsupportedFieldKind`] if the field declares no type
/// or its first type has no serializer.
pub fn field_kind(field: &Field) -> CoreResult<ValueKind> {
    let tag = field
        .expected_types
        .first()
        .ok_or_else(|| CoreError::unsupported_field_kind(&field.code, ""))?;
    ValueKind::from_tag(&field.code, tag)
}

/// Serializes the value of `field`.
///
/// Returns `None` for `null`, which is not stored.
///
/// # Errors
///
/// Fails if the field has no serializer or the value has the wrong shape.
pub fn encode_field(field: &Field, value: &Value) -> CoreResult<Option<String>> {
    if value.is_null() {
        return Ok(None);
    }
    let kind = field_kind(field)?;
    if !field.multiple_values {
        return kind.encode(&field.code, value).map(Some);
    }

    let items = value
        .as_array()
        .ok_or_else(|| CoreError::invalid_value(&field.code, "an array of values"))?;
    let encoded = items
        .iter()
        .map(|item| kind.encode(&field.code, item))
        .collect::<CoreResult<Vec<String>>>()?;
    Ok(Some(serde_json::to_string(&encoded)?))
}

/// Parses the stored value of `field`.
///
/// # Errors
///
/// Fails if the field has no serializer or `raw` is malformed.
pub fn decode_field(field: &Field, raw: &str) -> CoreResult<Value> {
    let kind = field_kind(field)?;
    if !field.multiple_values {
        return kind.decode(&field.code, raw);
    }

    let items: Vec<String> = serde_json::from_str(raw).map_err(|e| {
        CoreError::decode(format!("field '{}': malformed value list: {e}", field.code))
    })?;
    items
        .iter()
        .map(|item| kind.decode(&field.code, item))
        .collect::<CoreResult<Vec<Value>>>()
        .map(Value::Array)
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// A doctype code: lowercase ASCII letters, digits, `_` and `-`, starting
/// with a letter.
fn is_doctype_code(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(tag: &str, multiple: bool) -> Field {
        let field = Field::new("f", "F", [tag]);
        if multiple {
            field.multiple()
        } else {
            field
        }
    }

    #[test]
    fn tags_resolve() {
        assert_eq!(ValueKind::from_tag("f", "string").unwrap(), ValueKind::String);
        assert_eq!(ValueKind::from_tag("f", "int").unwrap(), ValueKind::Integer);
        assert_eq!(ValueKind::from_tag("f", "bool").unwrap(), ValueKind::Boolean);
        assert_eq!(
            ValueKind::from_tag("f", "page").unwrap(),
            ValueKind::Reference("page".into())
        );
    }

    #[test]
    fn unknown_tags_are_unsupported() {
        for tag in ["", "[]string", "map[string]int", "Page", "a/b", "time.Time"] {
            assert!(
                matches!(
                    ValueKind::from_tag("f", tag),
                    Err(CoreError::UnsupportedFieldKind { .. })
                ),
                "{tag} should be unsupported"
            );
        }
    }

    #[test]
    fn field_without_types_is_unsupported() {
        let f = Field::new("f", "F", Vec::<String>::new());
        assert!(matches!(
            encode_field(&f, &json!("x")),
            Err(CoreError::UnsupportedFieldKind { .. })
        ));
    }

    #[test]
    fn scalar_values_roundtrip() {
        let cases = [
            ("string", json!("My First Page")),
            ("integer", json!(-42)),
            ("float", json!(2.5)),
            ("boolean", json!(true)),
            ("datetime", json!("2024-05-01T10:20:30Z")),
            ("page", json!("0a1b2c3d")),
        ];
        for (tag, value) in cases {
            let f = field(tag, false);
            let raw = encode_field(&f, &value).unwrap().unwrap();
            assert_eq!(decode_field(&f, &raw).unwrap(), value, "tag {tag}");
        }
    }

    #[test]
    fn string_is_stored_raw() {
        let raw = encode_field(&field("string", false), &json!("a \"quoted\" text")).unwrap();
        assert_eq!(raw.as_deref(), Some("a \"quoted\" text"));
    }

    #[test]
    fn datetime_is_normalized_to_utc() {
        let f = field("datetime", false);
        let raw = encode_field(&f, &json!("2024-05-01T12:00:00+02:00")).unwrap().unwrap();
        assert_eq!(raw, "2024-05-01T10:00:00Z");
    }

    #[test]
    fn wrong_shape_is_invalid_value() {
        let cases = [
            ("string", json!(1)),
            ("integer", json!("1")),
            ("integer", json!(1.5)),
            ("boolean", json!("true")),
            ("datetime", json!("not a date")),
            ("page", json!("a/b")),
        ];
        for (tag, value) in cases {
            assert!(
                matches!(
                    encode_field(&field(tag, false), &value),
                    Err(CoreError::InvalidValue { .. })
                ),
                "tag {tag} value {value}"
            );
        }
    }

    #[test]
    fn null_is_not_stored() {
        assert_eq!(encode_field(&field("string", false), &Value::Null).unwrap(), None);
    }

    #[test]
    fn multiple_values_keep_order_and_duplicates() {
        let f = field("string", true);
        let value = json!(["rust", "kv", "rust"]);
        let raw = encode_field(&f, &value).unwrap().unwrap();
        assert_eq!(raw, r#"["rust","kv","rust"]"#);
        assert_eq!(decode_field(&f, &raw).unwrap(), value);
    }

    #[test]
    fn multiple_integers_roundtrip() {
        let f = field("integer", true);
        let value = json!([3, 1, 2]);
        let raw = encode_field(&f, &value).unwrap().unwrap();
        assert_eq!(decode_field(&f, &raw).unwrap(), value);
    }

    #[test]
    fn multiple_values_require_array() {
        assert!(matches!(
            encode_field(&field("string", true), &json!("solo")),
            Err(CoreError::InvalidValue { .. })
        ));
    }

    #[test]
    fn malformed_stored_values_are_decode_errors() {
        assert!(matches!(
            decode_field(&field("integer", false), "twelve"),
            Err(CoreError::Decode { .. })
        ));
        assert!(matches!(
            decode_field(&field("boolean", false), "yes"),
            Err(CoreError::Decode { .. })
        ));
        assert!(matches!(
            decode_field(&field("string", true), "not json"),
            Err(CoreError::Decode { .. })
        ));
    }
}
