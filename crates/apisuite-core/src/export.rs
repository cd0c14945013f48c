//! HTTP file export - renders scenarios in .http format

use crate::model::TestScenario;

/// Headers every executed request carries.
pub const BASELINE_HEADERS: [(&str, &str); 3] = [
    ("Content-Type", "application/json"),
    ("Accept", "application/json"),
    ("User-Agent", concat!("apisuite/", env!("CARGO_PKG_VERSION"))),
];

/// Generate .http file content from scenarios
pub fn to_http_file(scenarios: &[TestScenario], base_url_var: &str) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "# Auto-generated test scenarios ({} scenarios)",
        scenarios.len()
    ));
    lines.push(format!("# Base URL variable: {{{{{base_url_var}}}}}"));
    lines.push(String::new());

    for scenario in scenarios {
        lines.push(format!("### {} [{}]", scenario.name, scenario.group));
        if let Some(status) = scenario.expected_status {
            lines.push(format!("# Expect: {status}"));
        }

        // Request line
        let url = if scenario.url.starts_with("http") {
            scenario.url.clone()
        } else {
            format!("{{{{{base_url_var}}}}}{}", scenario.url)
        };
        lines.push(format!("{} {url}", scenario.method));

        for (key, value) in BASELINE_HEADERS {
            if key == "Content-Type" && scenario.body.is_none() {
                continue;
            }
            lines.push(format!("{key}: {value}"));
        }

        if let Some(body) = &scenario.body {
            lines.push(String::new());
            lines.push(body.clone());
        }

        lines.push(String::new());
    }

    lines.join("\n")
}
