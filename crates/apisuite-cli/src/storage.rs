//! Persistent report storage - `~/.apisuite/reports/`
//!
//! Every `apisuite run` and `apisuite retry` is saved regardless of `--output` mode.
//! Directory layout: `{host_port}_{run_name}_{timestamp}/`

use std::path::{Path, PathBuf};

use chrono::Utc;

use apisuite_core::model::ExecutionStatus;
use apisuite_core::{Config, RunReport, TestScenario, to_http_file};

/// Save `report` under the configured report directory.
///
/// Returns the report directory path on success.
pub fn save_report(config: &Config, report: &RunReport) -> Result<PathBuf, std::io::Error> {
    let base = match &config.report_dir {
        Some(dir) => dir.clone(),
        None => report_base_dir()?,
    };
    save_report_in(&base, config, report)
}

/// Save `report` into a fresh directory below `base`.
pub fn save_report_in(
    base: &Path,
    config: &Config,
    report: &RunReport,
) -> Result<PathBuf, std::io::Error> {
    let report_dir = base.join(build_dir_name(config.base_url.as_deref(), &report.run.name));
    std::fs::create_dir_all(&report_dir)?;

    // report.json - full run, credentials masked
    let mut masked = report.clone();
    masked.mask_sensitive_headers();
    masked
        .save(&report_dir.join("report.json"))
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    // config.toml - snapshot of the config used, header values masked
    let mut snapshot = config.clone();
    for value in snapshot.headers.values_mut() {
        *value = "***".to_string();
    }
    let config_toml =
        toml::to_string_pretty(&snapshot).map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(report_dir.join("config.toml"), config_toml)?;

    // summary.json - run status + stats + metadata
    let run = &report.run;
    let summary = serde_json::json!({
        "run": {
            "id": run.id,
            "name": run.name,
            "trigger": run.trigger,
            "status": run.status,
            "error_message": run.error_message,
            "retry_of": run.retry_of,
        },
        "stats": {
            "total": run.stats.total,
            "passed": run.stats.passed,
            "failed": run.stats.failed,
            "skipped": run.stats.skipped,
            "error": report.errors(),
        },
        "meta": {
            "timestamp": Utc::now().to_rfc3339(),
            "duration_ms": run.duration().map(|d| d.num_milliseconds()),
            "base_url": config.base_url,
            "spec": config.spec.display().to_string(),
        },
    });
    std::fs::write(
        report_dir.join("summary.json"),
        serde_json::to_string_pretty(&summary).unwrap_or_default(),
    )?;

    // failures.http - failed scenarios for quick replay in IDE/curl
    let failed = failed_scenarios(report);
    if !failed.is_empty() {
        std::fs::write(
            report_dir.join("failures.http"),
            to_http_file(&failed, "base_url"),
        )?;
    }

    Ok(report_dir)
}

fn failed_scenarios(report: &RunReport) -> Vec<TestScenario> {
    report
        .executions
        .iter()
        .filter(|e| matches!(e.status, ExecutionStatus::Failed | ExecutionStatus::Error))
        .filter_map(|e| report.scenarios.iter().find(|s| s.id == e.scenario_id))
        .cloned()
        .collect()
}

fn report_base_dir() -> Result<PathBuf, std::io::Error> {
    let home = std::env::var("HOME")
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home).join(".apisuite").join("reports"))
}

/// `{host_port}_{run_name}_{timestamp}` e.g. `localhost_8080_petstore_full_suite_20260205T193000123`
fn build_dir_name(base_url: Option<&str>, run_name: &str) -> String {
    let host_port = base_url.map_or_else(|| "local".to_string(), extract_host_port);
    let ts = Utc::now().format("%Y%m%dT%H%M%S%3f");
    format!("{host_port}_{}_{ts}", slug(run_name))
}

/// `"http://localhost:8080/path"` → `"localhost_8080"`
fn extract_host_port(url: &str) -> String {
    url.split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("unknown")
        .replace(':', "_")
}

/// `"Petstore Smoke Tests"` → `"petstore_smoke_tests"`
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}
