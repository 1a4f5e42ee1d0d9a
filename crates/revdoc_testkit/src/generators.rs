//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random schemas and documents
//! that satisfy the store's input rules.

use chrono::{DateTime, SecondsFormat, Utc};
use proptest::prelude::*;
use revdoc_core::{Doctype, DoctypeBuilder, Document};
use serde_json::Value;

/// Scalar type tags with a built-in serializer.
pub const SCALAR_TAGS: &[&str] = &["string", "integer", "float", "boolean", "datetime"];

/// Strategy for generating valid doctype and field codes.
pub fn doctype_code_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating valid document slugs.
pub fn slug_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9][a-z0-9-]{0,31}").expect("Invalid regex")
}

/// Strategy for generating human-readable names.
pub fn verbose_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z][A-Za-z0-9 ]{0,23}").expect("Invalid regex")
}

/// Strategy for generating free-form string values.
pub fn string_value_strategy() -> impl Strategy<Value = String> {
    ".{0,64}"
}

/// Strategy for generating one of [`SCALAR_TAGS`].
pub fn scalar_tag_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(SCALAR_TAGS)
}

/// Strategy for generating a value that round-trips through the serializer
/// of `tag`.
pub fn scalar_value_strategy(tag: &str) -> BoxedStrategy<Value> {
    match tag {
        "integer" => any::<i64>().prop_map(Value::from).boxed(),
        "float" => (-1.0e12f64..1.0e12).prop_map(Value::from).boxed(),
        "boolean" => any::<bool>().prop_map(Value::Bool).boxed(),
        "datetime" => (0i64..4_102_444_800)
            .prop_filter_map("timestamp out of range", |secs| {
                DateTime::<Utc>::from_timestamp(secs, 0)
                    .map(|dt| Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
            })
            .boxed(),
        _ => string_value_strategy().prop_map(Value::String).boxed(),
    }
}

/// A generated field declaration.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field code.
    pub code: String,
    /// Display name.
    pub verbose_name: String,
    /// Scalar type tag.
    pub type_tag: &'static str,
    /// Whether the field holds a list.
    pub multiple: bool,
}

/// Strategy for generating one field declaration.
pub fn field_spec_strategy() -> impl Strategy<Value = FieldSpec> {
    (doctype_code_strategy(), verbose_name_strategy(), scalar_tag_strategy(), any::<bool>()).prop_map(
        |(code, verbose_name, type_tag, multiple)| FieldSpec {
            code,
            verbose_name,
            type_tag,
            multiple,
        },
    )
}

/// Strategy for generating a doctype schema with 1 to `max_fields` fields
/// of distinct codes.
pub fn schema_strategy(max_fields: usize) -> impl Strategy<Value = DoctypeBuilder> {
    (
        doctype_code_strategy(),
        verbose_name_strategy(),
        prop::collection::vec(field_spec_strategy(), 1..=max_fields.max(1)),
    )
        .prop_map(|(code, verbose_name, specs)| {
            let mut seen = std::collections::HashSet::new();
            specs
                .into_iter()
                .filter(|spec| seen.insert(spec.code.clone()))
                .fold(DoctypeBuilder::new(code, verbose_name), |builder, spec| {
                    if spec.multiple {
                        builder.multi_field(&spec.code, &spec.verbose_name, spec.type_tag)
                    } else {
                        builder.field(&spec.code, &spec.verbose_name, spec.type_tag)
                    }
                })
        })
}

/// Strategy for generating a document of `doctype` with a valid value for
/// every declared field.
pub fn document_strategy(doctype: &Doctype) -> BoxedStrategy<Document> {
    let code = doctype.code.clone();
    let fields: Vec<BoxedStrategy<(String, Value)>> = doctype
        .fields
        .values()
        .map(|field| {
            let tag = field.expected_types.first().map_or("string", String::as_str);
            let value = scalar_value_strategy(tag);
            let field_code = field.code.clone();
            if field.multiple_values {
                prop::collection::vec(value, 0..4)
                    .prop_map(move |items| (field_code.clone(), Value::Array(items)))
                    .boxed()
            } else {
                value.prop_map(move |v| (field_code.clone(), v)).boxed()
            }
        })
        .collect();

    (slug_strategy(), fields)
        .prop_map(move |(slug, values)| {
            let mut doc = Document::new(slug, code.clone());
            for (field_code, value) in values {
                doc.set(field_code, value);
            }
            doc
        })
        .boxed()
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
