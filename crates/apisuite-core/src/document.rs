//! Typed API document: paths → operations → parameters/schemas
//!
//! This is the shape handed to the scenario generator. It is produced by
//! [`crate::openapi`] (or any other parser) and never mutated afterwards.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parsed API description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApiDocument {
    pub id: String,
    pub title: String,
    /// Server root, e.g. `https://api.example.com/v1` (no trailing slash)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Path template → operations, in declaration order
    #[serde(default)]
    pub paths: IndexMap<String, PathItem>,
}

impl ApiDocument {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            base_url: None,
            paths: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Append an operation under `path`, creating the path entry if needed.
    #[must_use]
    pub fn with_operation(mut self, path: impl Into<String>, operation: Operation) -> Self {
        self.paths
            .entry(path.into())
            .or_default()
            .operations
            .push(operation);
        self
    }

    /// Iterate `(path, operation)` pairs in declaration order.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &Operation)> {
        self.paths
            .iter()
            .flat_map(|(path, item)| item.operations.iter().map(move |op| (path.as_str(), op)))
    }
}

/// All operations declared under one path template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PathItem {
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl PathItem {
    /// First read (GET) operation, if any.
    #[must_use]
    pub fn read_operation(&self) -> Option<&Operation> {
        self.operations.iter().find(|op| op.method.is_read())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    #[must_use]
    pub const fn is_read(self) -> bool {
        matches!(self, Self::Get)
    }

    /// Case-insensitive lookup, e.g. `"get"` → `Get`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One HTTP operation on a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Operation {
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Schema>,
    #[serde(default)]
    pub responses: Vec<ResponseDef>,
}

impl Operation {
    #[must_use]
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            operation_id: None,
            summary: None,
            parameters: Vec::new(),
            request_body: None,
            responses: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn with_body(mut self, schema: Schema) -> Self {
        self.request_body = Some(schema);
        self
    }

    #[must_use]
    pub fn with_response(mut self, status: impl Into<String>, schema: Option<Schema>) -> Self {
        self.responses.push(ResponseDef {
            status: status.into(),
            description: None,
            schema,
        });
        self
    }

    /// Declared numeric status codes (`"default"`, `"2XX"` etc. are skipped).
    pub fn declared_statuses(&self) -> impl Iterator<Item = u16> + '_ {
        self.responses.iter().filter_map(|r| r.status.parse().ok())
    }

    #[must_use]
    pub fn response(&self, status: u16) -> Option<&ResponseDef> {
        self.responses
            .iter()
            .find(|r| r.status.parse::<u16>().ok() == Some(status))
    }

    pub fn path_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.location == ParamLocation::Path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

impl Parameter {
    #[must_use]
    pub fn path(name: impl Into<String>, kind: SchemaKind) -> Self {
        Self {
            name: name.into(),
            location: ParamLocation::Path,
            required: true,
            schema: Some(Schema::of(kind)),
        }
    }

    #[must_use]
    pub fn query(name: impl Into<String>, kind: SchemaKind, required: bool) -> Self {
        Self {
            name: name.into(),
            location: ParamLocation::Query,
            required,
            schema: Some(Schema::of(kind)),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Option<SchemaKind> {
        self.schema.as_ref().and_then(|s| s.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseDef {
    /// Status key as declared: `"200"`, `"404"`, `"default"`
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Primitive kind of a property schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Any type keyword this model does not know (`null`, custom extensions)
    #[serde(other)]
    Unknown,
}

impl SchemaKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Unknown => "unknown",
        }
    }
}

/// Property schema subset used for placeholder synthesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Schema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SchemaKind>,
    /// Component name for `$ref` schemas, or the declared `title`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
}

impl Schema {
    #[must_use]
    pub fn of(kind: SchemaKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn object() -> Self {
        Self::of(SchemaKind::Object)
    }

    #[must_use]
    pub fn array_of(items: Self) -> Self {
        Self {
            kind: Some(SchemaKind::Array),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, schema: Self) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    #[must_use]
    pub fn with_required(mut self, name: impl Into<String>, schema: Self) -> Self {
        let name = name.into();
        self.required.push(name.clone());
        self.properties.insert(name, schema);
        self
    }

    #[must_use]
    pub fn with_example(mut self, example: serde_json::Value) -> Self {
        self.example = Some(example);
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Declared kind, inferred from structure when `type` is absent.
    #[must_use]
    pub fn effective_kind(&self) -> SchemaKind {
        match self.kind {
            Some(kind) => kind,
            None if !self.properties.is_empty() => SchemaKind::Object,
            None if self.items.is_some() => SchemaKind::Array,
            None => SchemaKind::Unknown,
        }
    }

    #[must_use]
    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|r| r == property)
    }

    /// Short token naming this schema: its title, else its kind.
    #[must_use]
    pub fn token(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => match self.effective_kind() {
                SchemaKind::Array => {
                    let inner = self
                        .items
                        .as_ref()
                        .map_or_else(|| "unknown".to_string(), |i| i.token());
                    format!("array<{inner}>")
                }
                kind => kind.as_str().to_string(),
            },
        }
    }
}
