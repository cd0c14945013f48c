//! Scenario generator - API document → Smoke/System/Negative/Integration bundles
//!
//! Every call returns exactly four bundles, in [`SuiteGroup::ALL`] order.
//! The Integration bundle is narrative only: its workflows are not bound to
//! the document and carry no executable scenarios.

use crate::document::{ApiDocument, Operation, ParamLocation, SchemaKind};
use crate::model::{FeatureBundle, SuiteGroup, TestScenario};
use crate::synth;

/// Expected shape of every negative response.
pub const ERROR_SCHEMA_TOKEN: &str = r#"{"type":"object","properties":{"error":{"type":"string"},"message":{"type":"string"},"status":{"type":"integer"}}}"#;

/// Out-of-range identifier for "invalid ID" scenarios.
pub const INVALID_ID_SENTINEL: &str = "999999";

/// Header hint attached to positive scenarios.
pub const JSON_HEADER_HINT: &str = "Content-Type: application/json";

/// Response time asserted in smoke narratives.
const SMOKE_RESPONSE_TIME_MS: u64 = 2000;

/// Success statuses in preference order for positive scenarios.
const SUCCESS_STATUSES: [u16; 3] = [200, 201, 204];

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("Malformed path template `{path}`: {reason}")]
    MalformedPath { path: String, reason: String },
}

/// Generate all four bundles for `doc`.
///
/// # Errors
///
/// Returns [`GenerateError::MalformedPath`] if any path template is malformed.
/// No bundle is produced in that case.
pub fn generate(doc: &ApiDocument) -> Result<Vec<FeatureBundle>, GenerateError> {
    // Validate every template up front so failure never yields a partial set
    for path in doc.paths.keys() {
        placeholders(path)?;
    }

    let smoke = smoke_scenarios(doc)?;
    let system = system_scenarios(doc)?;
    let negative = negative_scenarios(doc)?;

    Ok(vec![
        bundle(doc, SuiteGroup::Smoke, smoke),
        bundle(doc, SuiteGroup::System, system),
        bundle(doc, SuiteGroup::Negative, negative),
        integration_bundle(doc),
    ])
}

// ── Smoke ──

fn smoke_scenarios(doc: &ApiDocument) -> Result<Vec<TestScenario>, GenerateError> {
    let mut scenarios = Vec::new();
    for (path, item) in &doc.paths {
        let Some(op) = item.read_operation() else {
            continue;
        };
        let url = resolve_url(doc, path, op, PathValues::Valid)?;
        let schema = response_token(op, 200);

        let mut s = scenario(doc, SuiteGroup::Smoke, path, op, "Smoke_Test", url);
        s.description = format!("Verify {} {path} responds successfully", op.method);
        s.expected_status = Some(200);
        s.expected_schema = schema;
        s.expected_headers = Some(JSON_HEADER_HINT.to_string());
        s.steps = steps(&[
            "Given the API is available".to_string(),
            "And valid authentication credentials are provided".to_string(),
            format!("When I send a {} request to \"{}\"", op.method, s.url),
            "Then the response status code should be 200".to_string(),
            format!("And the response should include the header \"{JSON_HEADER_HINT}\""),
            schema_step(s.expected_schema.as_deref()),
            format!("And the response time should be under {SMOKE_RESPONSE_TIME_MS} ms"),
        ]);
        scenarios.push(s);
    }
    Ok(scenarios)
}

// ── System ──

fn system_scenarios(doc: &ApiDocument) -> Result<Vec<TestScenario>, GenerateError> {
    let mut scenarios = Vec::new();
    for (path, op) in doc.operations() {
        let url = resolve_url(doc, path, op, PathValues::Valid)?;
        let status = success_status(op);

        let mut s = scenario(doc, SuiteGroup::System, path, op, "Valid_Request", url);
        s.description = format!(
            "{} {path} with a valid request returns {status}",
            op.method
        );
        s.body = op.request_body.as_ref().map(|b| synth::valid(b).to_string());
        s.expected_status = Some(status);
        s.expected_schema = response_token(op, status);
        s.expected_headers = Some(JSON_HEADER_HINT.to_string());

        let mut lines = vec![
            "Given the API is available".to_string(),
            "And valid authentication credentials are provided".to_string(),
        ];
        if s.body.is_some() {
            lines.push("And a request body with every declared property".to_string());
        }
        lines.push(format!("When I send a {} request to \"{}\"", op.method, s.url));
        lines.push(format!("Then the response status code should be {status}"));
        lines.push(schema_step(s.expected_schema.as_deref()));
        s.steps = steps(&lines);
        scenarios.push(s);
    }
    Ok(scenarios)
}

// ── Negative ──

fn negative_scenarios(doc: &ApiDocument) -> Result<Vec<TestScenario>, GenerateError> {
    let mut scenarios = Vec::new();
    for (path, op) in doc.operations() {
        let valid_url = resolve_url(doc, path, op, PathValues::Valid)?;
        let valid_body = op.request_body.as_ref().map(|b| synth::valid(b).to_string());

        if !placeholders(path)?.is_empty() {
            let url = resolve_url(doc, path, op, PathValues::Invalid)?;
            let mut s = negative(doc, path, op, "Invalid_ID", url, 404);
            s.description = format!("{} {path} with a non-existent identifier", op.method);
            s.body = valid_body.clone();
            s.steps = steps(&[
                "Given the API is available".to_string(),
                "And valid authentication credentials are provided".to_string(),
                format!("When I send a {} request to \"{}\"", op.method, s.url),
                "Then the response status code should be 404".to_string(),
                "And the response body should describe the error".to_string(),
            ]);
            scenarios.push(s);
        }

        if let Some(body) = &op.request_body {
            let mut s = negative(doc, path, op, "Invalid_Body", valid_url.clone(), 400);
            s.description = format!("{} {path} with wrongly typed body fields", op.method);
            s.body = Some(synth::invalid(body).to_string());
            s.steps = steps(&[
                "Given the API is available".to_string(),
                "And a request body whose fields have the wrong types".to_string(),
                format!("When I send a {} request to \"{}\"", op.method, s.url),
                "Then the response status code should be 400".to_string(),
                "And the response body should describe the validation error".to_string(),
            ]);
            scenarios.push(s);

            let mut s = negative(
                doc,
                path,
                op,
                "Missing_Required_Fields",
                valid_url.clone(),
                400,
            );
            s.description = format!("{} {path} without its required fields", op.method);
            s.body = Some(synth::incomplete(body).to_string());
            let missing = if body.required.is_empty() {
                "(none declared)".to_string()
            } else {
                body.required.join(", ")
            };
            s.steps = steps(&[
                "Given the API is available".to_string(),
                format!("And a request body missing the required fields: {missing}"),
                format!("When I send a {} request to \"{}\"", op.method, s.url),
                "Then the response status code should be 400".to_string(),
                "And the response body should list the missing fields".to_string(),
            ]);
            scenarios.push(s);
        }

        let mut s = negative(doc, path, op, "Unauthorized", valid_url, 401);
        s.description = format!("{} {path} without credentials", op.method);
        s.body = valid_body;
        s.requires_auth = false;
        s.steps = steps(&[
            "Given the API is available".to_string(),
            "And no authentication credentials are provided".to_string(),
            format!("When I send a {} request to \"{}\"", op.method, s.url),
            "Then the response status code should be 401".to_string(),
        ]);
        scenarios.push(s);
    }
    Ok(scenarios)
}

fn negative(
    doc: &ApiDocument,
    path: &str,
    op: &Operation,
    suffix: &str,
    url: String,
    status: u16,
) -> TestScenario {
    let mut s = scenario(doc, SuiteGroup::Negative, path, op, suffix, url);
    s.expected_status = Some(status);
    s.expected_schema = Some(ERROR_SCHEMA_TOKEN.to_string());
    s
}

// ── Integration ──

fn integration_bundle(doc: &ApiDocument) -> FeatureBundle {
    let workflows = [
        (
            "Full_CRUD_Workflow",
            [
                "Given the API is available",
                "When I create a new resource",
                "Then I can read the created resource",
                "When I update the resource",
                "Then the changes are visible on the next read",
                "When I delete the resource",
                "Then reading it again returns 404",
            ],
        ),
        (
            "Authenticated_Workflow",
            [
                "Given valid user credentials",
                "When I authenticate against the API",
                "Then I receive an access token",
                "When I call a protected endpoint with the token",
                "Then the response status code should be 200",
                "When I call the same endpoint without the token",
                "Then the response status code should be 401",
            ],
        ),
    ];

    let mut narrative = feature_header(doc, SuiteGroup::Integration);
    for (name, lines) in workflows {
        let owned: Vec<String> = lines.iter().map(|l| (*l).to_string()).collect();
        narrative.push_str(&scenario_block(name, &steps(&owned)));
    }

    FeatureBundle {
        id: uuid::Uuid::new_v4().to_string(),
        document_id: doc.id.clone(),
        group: SuiteGroup::Integration,
        name: bundle_name(doc, SuiteGroup::Integration),
        narrative,
        scenarios: Vec::new(),
    }
}

// ── Shared building blocks ──

fn bundle(doc: &ApiDocument, group: SuiteGroup, scenarios: Vec<TestScenario>) -> FeatureBundle {
    let mut narrative = feature_header(doc, group);
    for s in &scenarios {
        narrative.push_str(&scenario_block(&s.name, &s.steps));
    }
    FeatureBundle {
        id: uuid::Uuid::new_v4().to_string(),
        document_id: doc.id.clone(),
        group,
        name: bundle_name(doc, group),
        narrative,
        scenarios,
    }
}

fn bundle_name(doc: &ApiDocument, group: SuiteGroup) -> String {
    format!("{} - {}", doc.title, group.title())
}

fn feature_header(doc: &ApiDocument, group: SuiteGroup) -> String {
    let blurb = match group {
        SuiteGroup::Smoke => "Quick availability checks for every readable path",
        SuiteGroup::System => "Positive calls against every declared operation",
        SuiteGroup::Negative => "Invalid identifiers, malformed bodies and missing credentials",
        SuiteGroup::Integration => "End-to-end workflows spanning several operations",
    };
    format!("Feature: {} for {}\n  {blurb}\n", group.title(), doc.title)
}

fn scenario_block(name: &str, steps: &str) -> String {
    let mut block = format!("\n  Scenario: {name}\n");
    for line in steps.lines() {
        block.push_str("    ");
        block.push_str(line);
        block.push('\n');
    }
    block
}

fn steps(lines: &[String]) -> String {
    lines.join("\n")
}

fn schema_step(token: Option<&str>) -> String {
    match token {
        Some(t) => format!("And the response body should match the \"{t}\" schema"),
        None => "And the response body should be well-formed".to_string(),
    }
}

fn scenario(
    doc: &ApiDocument,
    group: SuiteGroup,
    path: &str,
    op: &Operation,
    suffix: &str,
    url: String,
) -> TestScenario {
    TestScenario {
        id: uuid::Uuid::new_v4().to_string(),
        document_id: doc.id.clone(),
        group,
        name: format!("{}_{suffix}", base_name(path, op)),
        description: String::new(),
        method: op.method,
        url,
        body: None,
        expected_status: None,
        expected_schema: None,
        expected_headers: None,
        steps: String::new(),
        requires_auth: true,
    }
}

/// Operation id if declared, else `METHOD_path`, with non-alphanumerics as `_`.
fn base_name(path: &str, op: &Operation) -> String {
    match op.operation_id.as_deref() {
        Some(id) if !id.trim().is_empty() => normalize_name(id),
        _ => normalize_name(&format!("{}_{path}", op.method)),
    }
}

fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn success_status(op: &Operation) -> u16 {
    SUCCESS_STATUSES
        .into_iter()
        .find(|s| op.declared_statuses().any(|d| d == *s))
        .unwrap_or(200)
}

fn response_token(op: &Operation, status: u16) -> Option<String> {
    op.response(status)
        .and_then(|r| r.schema.as_ref())
        .map(|s| s.token())
}

// ── Path resolution ──

#[derive(Clone, Copy, PartialEq, Eq)]
enum PathValues {
    Valid,
    Invalid,
}

/// Placeholder names in a path template, in order.
fn placeholders(path: &str) -> Result<Vec<String>, GenerateError> {
    let malformed = |reason: &str| GenerateError::MalformedPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let mut names = Vec::new();
    let mut current: Option<String> = None;
    for c in path.chars() {
        match (c, current.as_mut()) {
            ('{', None) => current = Some(String::new()),
            ('{', Some(_)) => return Err(malformed("nested `{`")),
            ('}', None) => return Err(malformed("unmatched `}`")),
            ('}', Some(name)) => {
                if name.trim().is_empty() {
                    return Err(malformed("empty placeholder"));
                }
                names.push(name.clone());
                current = None;
            }
            (c, Some(name)) => name.push(c),
            (_, None) => {}
        }
    }
    if current.is_some() {
        return Err(malformed("unterminated `{`"));
    }
    Ok(names)
}

fn resolve_url(
    doc: &ApiDocument,
    path: &str,
    op: &Operation,
    values: PathValues,
) -> Result<String, GenerateError> {
    let mut resolved = path.to_string();
    for name in placeholders(path)? {
        let kind = op
            .path_parameters()
            .find(|p| p.name == name)
            .and_then(|p| p.kind());
        let value = match values {
            PathValues::Valid => heuristic_value(&name, kind),
            PathValues::Invalid => invalid_path_value(kind),
        };
        resolved = resolved.replace(&format!("{{{name}}}"), &value);
    }

    let query: Vec<String> = op
        .parameters
        .iter()
        .filter(|p| p.location == ParamLocation::Query && p.required)
        .map(|p| format!("{}={}", p.name, heuristic_value(&p.name, p.kind())))
        .collect();
    if !query.is_empty() {
        resolved.push('?');
        resolved.push_str(&query.join("&"));
    }

    Ok(match &doc.base_url {
        Some(base) => format!("{base}{resolved}"),
        None => resolved,
    })
}

/// Test value picked by parameter-name keyword, then by schema kind.
fn heuristic_value(name: &str, kind: Option<SchemaKind>) -> String {
    let lower = name.to_ascii_lowercase();
    let value = if lower.contains("uuid") || lower.contains("guid") {
        "00000000-0000-0000-0000-000000000001"
    } else if is_identifier(name) {
        "1"
    } else if lower.contains("email") {
        "test@example.com"
    } else if lower.contains("date") {
        "2024-01-01"
    } else {
        match kind {
            Some(SchemaKind::Integer) => "1",
            Some(SchemaKind::Number) => "1.0",
            Some(SchemaKind::Boolean) => "true",
            _ => "test",
        }
    };
    value.to_string()
}

fn is_identifier(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower == "id"
        || lower.ends_with("_id")
        || lower.ends_with("-id")
        || name.ends_with("Id")
        || name.ends_with("ID")
}

fn invalid_path_value(kind: Option<SchemaKind>) -> String {
    match kind {
        Some(SchemaKind::String) => String::new(),
        _ => INVALID_ID_SENTINEL.to_string(),
    }
}
