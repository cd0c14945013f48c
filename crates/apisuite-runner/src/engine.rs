//! Execution engine - runs a batch of executions on the shared worker pool
//!
//! `ExecutionEngine::run` blocks until every execution of the run has a
//! terminal verdict. Each execution is owned by exactly one worker from
//! dispatch to verdict. The run record is only touched by the calling thread:
//! on start, on completion and on the failure path.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rayon::prelude::*;

use apisuite_core::model::{
    ExecutionStatus, RequestSnapshot, ResponseSnapshot, TestExecution, TestRun, TestScenario,
};
use apisuite_core::{BASELINE_HEADERS, Config, Repository, RepositoryError, aggregate, validate};

use crate::pool::WorkerPool;

/// Per-call settings shared by all workers.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Target server. Relative scenario URLs are joined onto it and absolute
    /// ones are rebased onto it, keeping their path and query.
    pub base_url: Option<String>,
    /// Credential headers, sent only to scenarios that require auth
    pub headers: BTreeMap<String, String>,
    /// Hard limit for one HTTP call
    pub timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: BTreeMap::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl EngineSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            headers: config.headers.clone(),
            timeout: config.request_timeout(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP client error: {0}")]
    Client(String),
    #[error("Cannot finalize run: {0}")]
    Finalize(#[from] RepositoryError),
}

/// Terminal verdict of one execution plus what explains it.
///
/// Every per-execution fault ends up here; nothing a worker does returns an
/// error to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub verdict: ExecutionStatus,
    pub detail: Option<String>,
}

impl Outcome {
    const fn passed() -> Self {
        Self {
            verdict: ExecutionStatus::Passed,
            detail: None,
        }
    }

    const fn failed() -> Self {
        Self {
            verdict: ExecutionStatus::Failed,
            detail: None,
        }
    }

    fn error(detail: impl Into<String>) -> Self {
        Self {
            verdict: ExecutionStatus::Error,
            detail: Some(detail.into()),
        }
    }
}

pub struct ExecutionEngine {
    repo: Arc<dyn Repository>,
    pool: Arc<WorkerPool>,
    client: reqwest::blocking::Client,
    settings: EngineSettings,
}

impl ExecutionEngine {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(
        repo: Arc<dyn Repository>,
        pool: Arc<WorkerPool>,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EngineError::Client(e.to_string()))?;
        Ok(Self {
            repo,
            pool,
            client,
            settings,
        })
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    #[must_use]
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Execute every execution of `run` and return the finished run.
    ///
    /// The returned run is `Completed` unless finalization failed, in which
    /// case it is `Failed` and still carries the statistics computed so far.
    pub fn run(&self, mut run: TestRun, mut executions: Vec<TestExecution>) -> TestRun {
        run.mark_running();
        if let Err(e) = self.repo.save_run(&run) {
            tracing::warn!(run = %run.id, error = %e, "cannot persist run start");
        }
        tracing::info!(
            run = %run.id,
            name = %run.name,
            executions = executions.len(),
            workers = self.pool.capacity(),
            "run started"
        );

        self.pool.install(|| {
            executions
                .par_iter_mut()
                .for_each(|execution| self.execute_isolated(execution));
        });

        if let Err(e) = self.finalize(&mut run, &executions) {
            run.mark_failed(e.to_string());
            if let Err(e) = self.repo.save_run(&run) {
                tracing::warn!(run = %run.id, error = %e, "cannot persist failed run");
            }
            tracing::warn!(
                run = %run.id,
                error = run.error_message.as_deref().unwrap_or_default(),
                "run failed"
            );
            return run;
        }

        tracing::info!(
            run = %run.id,
            total = run.stats.total,
            passed = run.stats.passed,
            failed = run.stats.failed,
            errors = aggregate::error_count(&executions),
            "run completed"
        );
        run
    }

    fn finalize(&self, run: &mut TestRun, executions: &[TestExecution]) -> Result<(), EngineError> {
        run.stats = aggregate::aggregate(executions);
        run.mark_completed();
        self.repo.save_run(run)?;
        Ok(())
    }

    /// [`Self::execute`], with a panic turned into an Error verdict so
    /// sibling executions keep running.
    fn execute_isolated(&self, execution: &mut TestExecution) {
        let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.execute(execution))) else {
            return;
        };
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::warn!(execution = %execution.id, reason = %reason, "execution panicked");

        execution.status = ExecutionStatus::Error;
        execution.append_error(format!("Execution panicked: {reason}"));
        execution.finished_at = Some(Utc::now());
        let saved = panic::catch_unwind(AssertUnwindSafe(|| self.repo.save_execution(execution)));
        if !matches!(saved, Ok(Ok(()))) {
            tracing::warn!(execution = %execution.id, "cannot persist panicked execution");
        }
    }

    /// Drive one execution to a terminal verdict and persist it.
    fn execute(&self, execution: &mut TestExecution) {
        execution.mark_running();
        if let Err(e) = self.repo.save_execution(execution) {
            tracing::warn!(execution = %execution.id, error = %e, "cannot persist execution start");
        }

        let outcome = self.attempt(execution);
        execution.status = outcome.verdict;
        if let Some(detail) = &outcome.detail {
            execution.append_error(detail);
        }
        execution.finished_at = Some(Utc::now());

        tracing::debug!(
            execution = %execution.id,
            scenario = %execution.scenario_id,
            verdict = %execution.status,
            "execution finished"
        );
        if let Err(e) = self.repo.save_execution(execution) {
            tracing::warn!(execution = %execution.id, error = %e, "cannot persist execution result");
        }
    }

    fn attempt(&self, execution: &mut TestExecution) -> Outcome {
        let scenario = match self.repo.scenario(&execution.scenario_id) {
            Ok(s) => s,
            Err(e) => return Outcome::error(e.to_string()),
        };
        let url = match self.resolve_url(&scenario.url) {
            Ok(url) => url,
            Err(msg) => return Outcome::error(msg),
        };
        let method = match reqwest::Method::from_bytes(scenario.method.as_str().as_bytes()) {
            Ok(m) => m,
            Err(_) => return Outcome::error(format!("invalid HTTP method '{}'", scenario.method)),
        };

        let mut headers = self.request_headers(&scenario);
        headers.retain(|name, value| {
            let sendable = reqwest::header::HeaderName::from_bytes(name.as_bytes()).is_ok()
                && reqwest::header::HeaderValue::from_str(value).is_ok();
            if !sendable {
                execution.append_error(format!("Header '{name}' not sent: invalid name or value"));
            }
            sendable
        });
        execution.request = Some(RequestSnapshot {
            method: scenario.method.to_string(),
            url: url.clone(),
            headers: headers.clone(),
            body: scenario.body.clone(),
        });

        let mut req = self.client.request(method, &url);
        for (k, v) in &headers {
            req = req.header(k, v);
        }
        if let Some(body) = &scenario.body {
            req = req.body(body.clone());
        }

        let start = Instant::now();
        let resp = match req.send() {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                return Outcome::error(format!(
                    "Request timed out after {}s ({}ms elapsed): {}",
                    self.settings.timeout.as_secs_f64(),
                    elapsed_ms(start),
                    error_chain(&e)
                ));
            }
            Err(e) => {
                return Outcome::error(format!(
                    "Request failed after {}ms: {}",
                    elapsed_ms(start),
                    error_chain(&e)
                ));
            }
        };

        let status_code = resp.status().as_u16();
        let header_block = flatten_headers(resp.headers());
        let body = resp.text();

        // Status and headers are kept even when the body cannot be read
        let (body, unread) = match body {
            Ok(text) if text.is_empty() => (None, None),
            Ok(text) => (Some(text), None),
            Err(e) => (None, Some(error_chain(&e))),
        };
        execution.response = Some(ResponseSnapshot {
            status_code,
            headers: header_block,
            body,
            elapsed_ms: elapsed_ms(start),
        });
        if let Some(reason) = unread {
            return Outcome::error(format!("Cannot read response body: {reason}"));
        }

        if validate(&scenario, execution) {
            Outcome::passed()
        } else {
            Outcome::failed()
        }
    }

    /// Baseline headers, then credentials when the scenario requires auth.
    fn request_headers(&self, scenario: &TestScenario) -> BTreeMap<String, String> {
        let mut headers: BTreeMap<String, String> = BASELINE_HEADERS
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        if scenario.requires_auth {
            for (k, v) in &self.settings.headers {
                headers.insert(k.clone(), v.clone());
            }
        }
        headers
    }

    fn resolve_url(&self, url: &str) -> Result<String, String> {
        let after_scheme = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"));
        let Some(base) = &self.settings.base_url else {
            return match after_scheme {
                Some(_) => Ok(url.to_string()),
                None => Err(format!("relative URL '{url}' and no base_url configured")),
            };
        };

        // Absolute URLs keep everything after the origin
        let rest = match after_scheme {
            Some(tail) => &tail[tail.find(['/', '?']).unwrap_or(tail.len())..],
            None => url,
        };
        let base = base.trim_end_matches('/');
        if rest.is_empty() || rest.starts_with('/') || rest.starts_with('?') {
            Ok(format!("{base}{rest}"))
        } else {
            Ok(format!("{base}/{rest}"))
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// `e` followed by each of its sources, colon separated.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// One `name: value` line per header.
fn flatten_headers(headers: &reqwest::header::HeaderMap) -> String {
    let mut block = String::new();
    for (name, value) in headers {
        block.push_str(name.as_str());
        block.push_str(": ");
        block.push_str(value.to_str().unwrap_or("<binary>"));
        block.push('\n');
    }
    block
}
