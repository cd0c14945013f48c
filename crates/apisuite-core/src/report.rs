//! Run report interchange format
//!
//! A report is a self-contained snapshot of one run: the run record, its
//! executions and the scenarios they reference. Saved reports can be loaded
//! back into a [`Repository`] to retry their failures.

use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::aggregate;
use crate::model::{TestExecution, TestRun, TestScenario};
use crate::repository::{Repository, RepositoryError};

/// Headers masked before a report leaves the process.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "x-api-key",
    "x-auth-token",
    "cookie",
    "set-cookie",
    "proxy-authorization",
];

/// Mask value for redacted headers.
const MASK: &str = "***";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RunReport {
    pub run: TestRun,
    pub executions: Vec<TestExecution>,
    pub scenarios: Vec<TestScenario>,
}

impl RunReport {
    /// Collect a run and everything it references from `repo`.
    ///
    /// # Errors
    ///
    /// Returns error if the run or one of its scenarios is missing.
    pub fn collect(repo: &dyn Repository, run_id: &str) -> Result<Self, RepositoryError> {
        let run = repo.run(run_id)?;
        let executions = repo.executions(run_id)?;
        let mut scenarios: Vec<TestScenario> = Vec::new();
        for exec in &executions {
            if !scenarios.iter().any(|s| s.id == exec.scenario_id) {
                scenarios.push(repo.scenario(&exec.scenario_id)?);
            }
        }
        Ok(Self {
            run,
            executions,
            scenarios,
        })
    }

    /// Write the report's records into `repo`.
    ///
    /// # Errors
    ///
    /// Returns the first storage error.
    pub fn restore(&self, repo: &dyn Repository) -> Result<(), RepositoryError> {
        for scenario in &self.scenarios {
            repo.save_scenario(scenario)?;
        }
        for exec in &self.executions {
            repo.save_execution(exec)?;
        }
        repo.save_run(&self.run)
    }

    /// Replace sensitive request header values with `***`.
    pub fn mask_sensitive_headers(&mut self) {
        for exec in &mut self.executions {
            if let Some(request) = &mut exec.request {
                for (key, value) in &mut request.headers {
                    if SENSITIVE_HEADERS.contains(&key.to_ascii_lowercase().as_str()) {
                        *value = MASK.to_string();
                    }
                }
            }
        }
    }

    /// Executions with an `Error` verdict (not part of any published counter).
    #[must_use]
    pub fn errors(&self) -> u64 {
        aggregate::error_count(&self.executions)
    }

    /// Save as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ReportError::Serialize(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| ReportError::Io(format!("{}: {e}", path.display())))
    }

    /// Load a report saved by [`RunReport::save`].
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReportError::Io(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&content).map_err(|e| ReportError::Serialize(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Generate JSON Schema for the report format.
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(RunReport);
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}
