//! Schema value synthesizer - deterministic placeholder values per schema
//!
//! Three modes:
//! - [`SynthMode::Valid`]: example if declared, else a type-appropriate placeholder
//! - [`SynthMode::Invalid`]: a value of the wrong primitive kind
//! - [`SynthMode::Incomplete`]: like valid, but without the parent's required properties
//!
//! Pure apart from the timestamp suffix on synthesized strings.

use chrono::Utc;
use serde_json::{Map, Value, json};

use crate::document::{Schema, SchemaKind};

/// Nesting limit for recursive schemas.
const MAX_DEPTH: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthMode {
    Valid,
    Invalid,
    Incomplete,
}

/// Synthesize one value for `schema` in the given mode.
#[must_use]
pub fn synthesize(schema: &Schema, mode: SynthMode) -> Value {
    match mode {
        SynthMode::Valid => valid(schema),
        SynthMode::Invalid => invalid(schema),
        SynthMode::Incomplete => incomplete(schema),
    }
}

/// Example if present, else a placeholder built from the declared type.
#[must_use]
pub fn valid(schema: &Schema) -> Value {
    valid_inner(schema, 0)
}

fn valid_inner(schema: &Schema, depth: u32) -> Value {
    if depth > MAX_DEPTH {
        return Value::Null;
    }
    if let Some(example) = &schema.example {
        return example.clone();
    }

    match schema.effective_kind() {
        SchemaKind::String => Value::String(placeholder_string()),
        SchemaKind::Integer => json!(1),
        SchemaKind::Number => json!(1.0),
        SchemaKind::Boolean => Value::Bool(true),
        SchemaKind::Array => {
            let item = schema
                .items
                .as_deref()
                .map_or_else(|| Value::String(placeholder_string()), |i| valid_inner(i, depth + 1));
            Value::Array(vec![item])
        }
        SchemaKind::Object => Value::Object(
            schema
                .properties
                .iter()
                .map(|(name, prop)| (name.clone(), valid_inner(prop, depth + 1)))
                .collect(),
        ),
        SchemaKind::Unknown => Value::Null,
    }
}

/// A value of the wrong primitive kind for the declared type.
///
/// Objects with properties get a field map of wrong-typed members, so the
/// payload still reaches per-field validation on the server.
#[must_use]
pub fn invalid(schema: &Schema) -> Value {
    match schema.effective_kind() {
        SchemaKind::Object if !schema.properties.is_empty() => Value::Object(
            schema
                .properties
                .iter()
                .map(|(name, prop)| (name.clone(), wrong_kind(prop.effective_kind())))
                .collect(),
        ),
        kind => wrong_kind(kind),
    }
}

/// Fixed substitution table: declared kind → value of another kind.
#[must_use]
pub fn wrong_kind(kind: SchemaKind) -> Value {
    match kind {
        SchemaKind::String => json!(12345),
        SchemaKind::Integer => json!("not_an_integer"),
        SchemaKind::Number => json!("not_a_number"),
        SchemaKind::Boolean => json!("not_a_boolean"),
        SchemaKind::Array => json!("not_an_array"),
        SchemaKind::Object => json!("not_an_object"),
        SchemaKind::Unknown => Value::Null,
    }
}

/// Valid values for the non-required properties only.
///
/// Non-object schemas have no required members to drop and synthesize as valid.
#[must_use]
pub fn incomplete(schema: &Schema) -> Value {
    if schema.effective_kind() != SchemaKind::Object {
        return valid(schema);
    }
    let fields: Map<String, Value> = schema
        .properties
        .iter()
        .filter(|(name, _)| !schema.is_required(name))
        .map(|(name, prop)| (name.clone(), valid_inner(prop, 1)))
        .collect();
    Value::Object(fields)
}

fn placeholder_string() -> String {
    format!("test_{}", Utc::now().timestamp_millis())
}
