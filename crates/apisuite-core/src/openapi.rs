//! OpenAPI 3.x loader - JSON/YAML text into a typed [`ApiDocument`]
//!
//! Only the subset the scenario generator consumes is extracted: operations,
//! parameters, JSON request bodies and JSON response schemas. `$ref`s into
//! `#/components/schemas` are inlined.

use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use crate::document::{
    ApiDocument, HttpMethod, Operation, ParamLocation, Parameter, PathItem, ResponseDef, Schema,
    SchemaKind,
};

/// Depth limit for `$ref` chains and nested schemas (circular refs).
const MAX_DEPTH: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Cannot read {0}: {1}")]
    Io(String, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid document: {0}")]
    Invalid(String),
}

/// Load and convert an OpenAPI file.
///
/// # Errors
///
/// Returns error if the file cannot be read, is not JSON/YAML, or has no `paths`.
pub fn load(path: &Path) -> Result<ApiDocument, DocumentError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DocumentError::Io(path.display().to_string(), e.to_string()))?;
    let raw = parse_text(path, &content)?;
    let doc = from_value(&raw)?;
    tracing::debug!(
        path = %path.display(),
        title = %doc.title,
        operations = doc.operations().count(),
        "document loaded"
    );
    Ok(doc)
}

/// Parse OpenAPI text from JSON or YAML.
///
/// Detection strategy: extension first (`.yaml`/`.yml`/`.json`), then content
/// sniffing (leading `{` → JSON, otherwise YAML).
///
/// # Errors
///
/// Returns error on malformed input.
pub fn parse_text(path: &Path, content: &str) -> Result<Value, DocumentError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "yaml" | "yml" => serde_yml::from_str(content)
            .map_err(|e| DocumentError::Parse(format!("Invalid YAML: {e}"))),
        "json" => serde_json::from_str(content)
            .map_err(|e| DocumentError::Parse(format!("Invalid JSON: {e}"))),
        _ => {
            if content.trim_start().starts_with('{') {
                serde_json::from_str(content)
                    .map_err(|e| DocumentError::Parse(format!("Invalid JSON: {e}")))
            } else {
                serde_yml::from_str(content)
                    .map_err(|e| DocumentError::Parse(format!("Invalid YAML: {e}")))
            }
        }
    }
}

/// Convert a raw OpenAPI value into an [`ApiDocument`].
///
/// # Errors
///
/// Returns [`DocumentError::Invalid`] if `paths` is missing or not an object.
pub fn from_value(spec: &Value) -> Result<ApiDocument, DocumentError> {
    let components = spec
        .get("components")
        .and_then(|c| c.get("schemas"))
        .cloned()
        .unwrap_or(Value::Null);

    let paths = spec
        .get("paths")
        .and_then(|p| p.as_object())
        .ok_or_else(|| DocumentError::Invalid("missing `paths` object".into()))?;

    let title = spec
        .get("info")
        .and_then(|i| i.get("title"))
        .and_then(|t| t.as_str())
        .unwrap_or("Untitled API");

    let mut doc = ApiDocument::new(title);
    if let Some(url) = spec
        .get("servers")
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
        .and_then(|s| s.get("url"))
        .and_then(|u| u.as_str())
    {
        doc = doc.with_base_url(url);
    }

    let mut converted: IndexMap<String, PathItem> = IndexMap::new();
    for (path, path_item) in paths {
        let mut item = PathItem::default();
        for method in HttpMethod::ALL {
            let key = method.as_str().to_ascii_lowercase();
            let Some(operation) = path_item.get(key.as_str()) else {
                continue;
            };
            item.operations
                .push(convert_operation(method, path_item, operation, &components));
        }
        converted.insert(path.clone(), item);
    }
    doc.paths = converted;
    Ok(doc)
}

fn convert_operation(
    method: HttpMethod,
    path_item: &Value,
    operation: &Value,
    components: &Value,
) -> Operation {
    let mut op = Operation::new(method);
    op.operation_id = operation
        .get("operationId")
        .and_then(|v| v.as_str())
        .map(String::from);
    op.summary = operation
        .get("summary")
        .and_then(|v| v.as_str())
        .map(String::from);

    // Path-level first, operation-level may override by name+location
    for source in [path_item.get("parameters"), operation.get("parameters")]
        .iter()
        .flatten()
    {
        if let Some(params) = source.as_array() {
            for raw in params {
                if let Some(p) = convert_parameter(raw, components) {
                    op.parameters
                        .retain(|e| !(e.name == p.name && e.location == p.location));
                    op.parameters.push(p);
                }
            }
        }
    }

    op.request_body = operation
        .get("requestBody")
        .map(|rb| resolve(rb, components))
        .and_then(|rb| json_content_schema(&rb))
        .map(|s| convert_schema(&s, components, 0));

    if let Some(responses) = operation.get("responses").and_then(|r| r.as_object()) {
        for (status, resp) in responses {
            let resp = resolve(resp, components);
            op.responses.push(ResponseDef {
                status: status.clone(),
                description: resp
                    .get("description")
                    .and_then(|d| d.as_str())
                    .map(String::from),
                schema: json_content_schema(&resp).map(|s| convert_schema(&s, components, 0)),
            });
        }
    }

    op
}

fn json_content_schema(container: &Value) -> Option<Value> {
    container
        .get("content")
        .and_then(|c| c.get("application/json"))
        .and_then(|ct| ct.get("schema"))
        .cloned()
}

fn convert_parameter(raw: &Value, components: &Value) -> Option<Parameter> {
    let raw = resolve(raw, components);
    let name = raw.get("name")?.as_str()?.to_string();
    let location = match raw.get("in")?.as_str()? {
        "path" => ParamLocation::Path,
        "query" => ParamLocation::Query,
        "header" => ParamLocation::Header,
        _ => return None,
    };
    let required = raw
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(location == ParamLocation::Path);
    let schema = raw.get("schema").map(|s| convert_schema(s, components, 0));

    Some(Parameter {
        name,
        location,
        required,
        schema,
    })
}

/// Follow a `#/components/schemas/...` (or any `#/components/*/...`) reference.
fn resolve(value: &Value, components: &Value) -> Value {
    let mut current = value.clone();
    for _ in 0..MAX_DEPTH {
        let Some(ref_str) = current.get("$ref").and_then(|v| v.as_str()) else {
            return current;
        };
        match resolve_ref(ref_str, components) {
            Some(next) => current = next,
            None => return current,
        }
    }
    current
}

fn resolve_ref(ref_str: &str, components: &Value) -> Option<Value> {
    ref_str
        .strip_prefix("#/components/schemas/")
        .and_then(|name| components.get(name).cloned())
}

fn ref_name(ref_str: &str) -> Option<&str> {
    ref_str.rsplit('/').next().filter(|s| !s.is_empty())
}

fn convert_schema(raw: &Value, components: &Value, depth: u32) -> Schema {
    if depth > MAX_DEPTH {
        return Schema::default();
    }

    if let Some(ref_str) = raw.get("$ref").and_then(|v| v.as_str()) {
        return match resolve_ref(ref_str, components) {
            Some(resolved) => {
                let mut schema = convert_schema(&resolved, components, depth + 1);
                if schema.title.is_none() {
                    schema.title = ref_name(ref_str).map(String::from);
                }
                schema
            }
            None => Schema::default(),
        };
    }

    // allOf: merge object members
    if let Some(all_of) = raw.get("allOf").and_then(|v| v.as_array()) {
        let mut merged = Schema::object();
        for sub in all_of {
            let part = convert_schema(sub, components, depth + 1);
            merged.properties.extend(part.properties);
            merged.required.extend(part.required);
            if merged.example.is_none() {
                merged.example = part.example;
            }
        }
        return merged;
    }

    // anyOf / oneOf: first non-null variant
    for key in ["anyOf", "oneOf"] {
        if let Some(variants) = raw.get(key).and_then(|v| v.as_array()) {
            return variants
                .iter()
                .find(|s| s.get("type").and_then(|t| t.as_str()) != Some("null"))
                .map(|s| convert_schema(s, components, depth + 1))
                .unwrap_or_default();
        }
    }

    let kind = match raw.get("type") {
        Some(Value::String(s)) => Some(kind_from_str(s)),
        // OpenAPI 3.1 `type: [string, "null"]`
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(|t| t.as_str())
            .find(|t| *t != "null")
            .map(kind_from_str),
        _ => None,
    };

    let properties = raw
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|props| {
            props
                .iter()
                .map(|(k, v)| (k.clone(), convert_schema(v, components, depth + 1)))
                .collect()
        })
        .unwrap_or_default();

    let required = raw
        .get("required")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    let example = raw.get("example").cloned().or_else(|| {
        raw.get("examples")
            .and_then(|e| e.as_array())
            .and_then(|e| e.first())
            .cloned()
    });

    Schema {
        kind,
        title: raw.get("title").and_then(|t| t.as_str()).map(String::from),
        format: raw.get("format").and_then(|f| f.as_str()).map(String::from),
        example,
        properties,
        required,
        items: raw
            .get("items")
            .map(|i| Box::new(convert_schema(i, components, depth + 1))),
    }
}

fn kind_from_str(s: &str) -> SchemaKind {
    match s {
        "string" => SchemaKind::String,
        "integer" => SchemaKind::Integer,
        "number" => SchemaKind::Number,
        "boolean" => SchemaKind::Boolean,
        "array" => SchemaKind::Array,
        "object" => SchemaKind::Object,
        _ => SchemaKind::Unknown,
    }
}
