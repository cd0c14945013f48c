//! Response validation (3-check pipeline)
//!
//! Checks are deliberately shallow: exact status, well-formed JSON body,
//! non-empty header block. No schema conformance, no header value matching.

use crate::model::{ResponseSnapshot, TestExecution, TestScenario};

/// Result of judging one response against one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// One entry per failed check
    pub failures: Vec<String>,
    /// Human-readable summary of every check that ran
    pub detail: String,
}

impl Validation {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run all checks. No I/O.
#[must_use]
pub fn check(scenario: &TestScenario, response: Option<&ResponseSnapshot>) -> Validation {
    let Some(response) = response else {
        return Validation {
            failures: vec!["No response captured".to_string()],
            detail: "not validated: no response".to_string(),
        };
    };

    let mut failures = Vec::new();
    let mut ran = Vec::new();

    // ── Check 1: exact status code ──
    if let Some(expected) = scenario.expected_status {
        ran.push(format!("status {} (expected {expected})", response.status_code));
        if response.status_code != expected {
            failures.push(format!(
                "Expected status {expected}, got {}",
                response.status_code
            ));
        }
    }

    // ── Check 2: body is well-formed JSON (syntax only) ──
    if let (Some(token), Some(body)) = (&scenario.expected_schema, &response.body) {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(_) => ran.push(format!("body well-formed for {}", short(token))),
            Err(e) => {
                ran.push("body malformed".to_string());
                failures.push(format!("Response body is not valid JSON: {e}"));
            }
        }
    }

    // ── Check 3: header block present ──
    if let Some(hint) = &scenario.expected_headers {
        ran.push(format!("headers present for `{hint}`"));
        if response.headers.trim().is_empty() {
            failures.push(format!("Expected headers (`{hint}`) but none were captured"));
        }
    }

    let detail = if ran.is_empty() {
        "no expectations declared".to_string()
    } else {
        ran.join("; ")
    };
    Validation { failures, detail }
}

/// Judge `execution` against `scenario`.
///
/// Records the check summary in `validation_detail` and appends one line per
/// failed check to `error_message`.
pub fn validate(scenario: &TestScenario, execution: &mut TestExecution) -> bool {
    let result = check(scenario, execution.response.as_ref());
    execution.validation_detail = Some(result.detail.clone());
    for failure in &result.failures {
        execution.append_error(failure);
    }
    result.passed()
}

fn short(token: &str) -> &str {
    if token.starts_with('{') {
        "error shape"
    } else {
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HttpMethod;
    use crate::generator::{ERROR_SCHEMA_TOKEN, JSON_HEADER_HINT};
    use crate::model::SuiteGroup;

    fn scenario() -> TestScenario {
        TestScenario {
            id: "s1".into(),
            document_id: "d1".into(),
            group: SuiteGroup::Smoke,
            name: "listUsers_Smoke_Test".into(),
            description: String::new(),
            method: HttpMethod::Get,
            url: "http://localhost/users".into(),
            body: None,
            expected_status: Some(200),
            expected_schema: Some("User".into()),
            expected_headers: Some(JSON_HEADER_HINT.into()),
            steps: String::new(),
            requires_auth: true,
        }
    }

    fn response(status: u16, body: Option<&str>, headers: &str) -> ResponseSnapshot {
        ResponseSnapshot {
            status_code: status,
            headers: headers.to_string(),
            body: body.map(String::from),
            elapsed_ms: 5,
        }
    }

    #[test]
    fn all_checks_pass() {
        let r = response(200, Some(r#"[{"id": 1}]"#), "content-type: application/json\n");
        let v = check(&scenario(), Some(&r));
        assert!(v.passed(), "{:?}", v.failures);
        assert!(v.detail.contains("status 200"));
    }

    #[test]
    fn status_mismatch_fails() {
        let r = response(500, Some("{}"), "content-type: application/json\n");
        let v = check(&scenario(), Some(&r));
        assert_eq!(v.failures, vec!["Expected status 200, got 500".to_string()]);
    }

    #[test]
    fn malformed_body_fails() {
        let r = response(200, Some("<html>oops</html>"), "content-type: text/html\n");
        let v = check(&scenario(), Some(&r));
        assert_eq!(v.failures.len(), 1);
        assert!(v.failures[0].starts_with("Response body is not valid JSON"));
    }

    #[test]
    fn body_check_is_syntax_only() {
        // Any well-formed JSON satisfies the schema token
        let r = response(200, Some(r#""just a string""#), "x: y\n");
        assert!(check(&scenario(), Some(&r)).passed());
    }

    #[test]
    fn body_not_checked_without_schema_token() {
        let mut s = scenario();
        s.expected_schema = None;
        let r = response(200, Some("not json"), "x: y\n");
        assert!(check(&s, Some(&r)).passed());
    }

    #[test]
    fn absent_body_skips_body_check() {
        let r = response(200, None, "x: y\n");
        assert!(check(&scenario(), Some(&r)).passed());
    }

    #[test]
    fn empty_header_block_fails() {
        let r = response(200, Some("{}"), "  ");
        let v = check(&scenario(), Some(&r));
        assert_eq!(v.failures.len(), 1);
        assert!(v.failures[0].contains("none were captured"));
    }

    #[test]
    fn header_values_are_not_matched() {
        let r = response(200, Some("{}"), "content-type: text/plain\n");
        assert!(check(&scenario(), Some(&r)).passed());
    }

    #[test]
    fn no_response_fails() {
        let v = check(&scenario(), None);
        assert!(!v.passed());
    }

    #[test]
    fn no_expectations_pass() {
        let mut s = scenario();
        s.expected_status = None;
        s.expected_schema = None;
        s.expected_headers = None;
        let v = check(&s, Some(&response(418, Some("?"), "")));
        assert!(v.passed());
        assert_eq!(v.detail, "no expectations declared");
    }

    #[test]
    fn validate_records_notes_on_execution() {
        let mut s = scenario();
        s.expected_schema = Some(ERROR_SCHEMA_TOKEN.into());
        let mut exec = TestExecution::pending("r1", "s1");
        exec.response = Some(response(404, Some("nope"), ""));

        assert!(!validate(&s, &mut exec));
        let msg = exec.error_message.unwrap();
        assert_eq!(msg.lines().count(), 3);
        assert!(exec.validation_detail.unwrap().contains("body malformed"));
    }
}
