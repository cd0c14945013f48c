//! Generated scenarios and the bundles that group them

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::document::HttpMethod;

/// Generation strategy a scenario belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SuiteGroup {
    /// One positive read per path
    Smoke,
    /// One positive call per operation
    System,
    /// Invalid input and missing credentials
    Negative,
    /// Multi-step workflows (descriptive only)
    Integration,
}

impl SuiteGroup {
    pub const ALL: [Self; 4] = [Self::Smoke, Self::System, Self::Negative, Self::Integration];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Smoke => "smoke",
            Self::System => "system",
            Self::Negative => "negative",
            Self::Integration => "integration",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Smoke => "Smoke Tests",
            Self::System => "System Tests",
            Self::Negative => "Negative Tests",
            Self::Integration => "Integration Tests",
        }
    }
}

impl std::fmt::Display for SuiteGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fully-resolved test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestScenario {
    pub id: String,
    pub document_id: String,
    pub group: SuiteGroup,
    pub name: String,
    pub description: String,
    pub method: HttpMethod,
    /// Absolute, or relative to the configured base URL when the document has none
    pub url: String,
    /// Serialized JSON request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
    /// Schema token the response is expected to carry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_schema: Option<String>,
    /// Header hint, e.g. `Content-Type: application/json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_headers: Option<String>,
    /// Given/When/Then narrative
    pub steps: String,
    /// Attach configured credential headers when sending
    #[serde(default = "default_true")]
    pub requires_auth: bool,
}

fn default_true() -> bool {
    true
}

impl TestScenario {
    /// Label used in logs and reports: `GET http://host/users/1`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// Named group of scenarios sharing one suite group, with a narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureBundle {
    pub id: String,
    pub document_id: String,
    pub group: SuiteGroup,
    pub name: String,
    /// Gherkin-style feature text
    pub narrative: String,
    #[serde(default)]
    pub scenarios: Vec<TestScenario>,
}

impl FeatureBundle {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
