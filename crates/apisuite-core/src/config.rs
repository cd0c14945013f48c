//! Project configuration for suite generation and execution

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API document path (OpenAPI JSON/YAML)
    pub spec: PathBuf,

    /// Base URL for scenarios with relative URLs (overrides the document's servers)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Credential and extra headers; omitted for unauthorized-access scenarios
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Worker pool size shared by all runs
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-call timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Interval between scheduled sweeps in seconds
    #[serde(default = "default_schedule_interval")]
    pub schedule_interval_secs: u64,

    /// Directory for saved run reports (default: "~/.apisuite/reports")
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

fn default_workers() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_schedule_interval() -> u64 {
    4 * 60 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: PathBuf::from("openapi.yaml"),
            base_url: None,
            headers: BTreeMap::new(),
            workers: default_workers(),
            request_timeout_secs: default_request_timeout(),
            schedule_interval_secs: default_schedule_interval(),
            report_dir: None,
        }
    }
}

impl Config {
    /// Load config from file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from default location (.apisuite.toml)
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".apisuite.toml", ".apisuite.json", "apisuite.toml"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
        }

        // No config file, return default
        Ok(Self::default())
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero pool size or timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.schedule_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "schedule_interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs)
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# apisuite configuration

# API document (OpenAPI JSON or YAML)
spec = "openapi.yaml"

# Server to test; used when the document declares no servers
# base_url = "http://localhost:8080"

# Parallel workers shared by all runs
workers = 10

# Per-call timeout in seconds
request_timeout_secs = 30

# Scheduled sweep interval in seconds (apisuite watch)
schedule_interval_secs = 14400

# Where run reports are saved (default: ~/.apisuite/reports)
# report_dir = ".apisuite/reports"

# Credential headers; left out of unauthorized-access scenarios
[headers]
Authorization = "Bearer your-token-here"
# X-API-Key = "your-api-key"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
