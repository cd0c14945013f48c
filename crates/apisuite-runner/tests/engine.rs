//! Execution engine against a live in-process HTTP stub

mod support;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use apisuite_core::model::{ExecutionStatus, RunStatus, TestExecution, TestRun, TriggerKind};
use apisuite_core::{InMemoryRepository, Repository, RepositoryError, RunStats};
use apisuite_runner::{EngineSettings, ExecutionEngine, WorkerPool};

fn settings(base_url: &str) -> EngineSettings {
    EngineSettings {
        base_url: Some(base_url.to_string()),
        headers: BTreeMap::from([("Authorization".to_string(), "Bearer secret".to_string())]),
        timeout: Duration::from_secs(5),
    }
}

fn engine_with(repo: Arc<dyn Repository>, workers: usize, settings: EngineSettings) -> ExecutionEngine {
    ExecutionEngine::new(repo, Arc::new(WorkerPool::new(workers).unwrap()), settings).unwrap()
}

#[test]
fn fifty_executions_on_ten_workers() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let run = TestRun::new("concurrency", TriggerKind::Manual);

    let mut executions = Vec::new();
    for i in 0..50 {
        let code = if i % 5 == 0 { 500 } else { 200 };
        let s = support::scenario("doc", &format!("s{i}"), &format!("/status/{code}/item/{i}"), 200);
        repo.save_scenario(&s).unwrap();
        executions.push(TestExecution::pending(&run.id, s.id));
    }

    let engine = engine_with(repo.clone(), 10, settings(&stub.base_url));
    let done = engine.run(run, executions);

    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(
        done.stats,
        RunStats {
            total: 50,
            passed: 40,
            failed: 10,
            skipped: 0,
        }
    );
    assert!(stub.peak() <= 10, "peak concurrency {}", stub.peak());

    let stored = repo.executions(&done.id).unwrap();
    assert_eq!(stored.len(), 50);
    for exec in &stored {
        let scenario = repo.scenario(&exec.scenario_id).unwrap();
        let body = exec.response.as_ref().unwrap().body.as_deref().unwrap();
        let echo: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(echo["path"], scenario.url.as_str());
        assert!(exec.request.as_ref().unwrap().url.ends_with(&scenario.url));
        assert!(exec.status.is_terminal());
    }
}

#[test]
fn failed_verdict_records_mismatch() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let s = support::scenario("doc", "missing", "/status/404/users/1", 200);
    repo.save_scenario(&s).unwrap();

    let run = TestRun::new("r", TriggerKind::Manual);
    let exec = TestExecution::pending(&run.id, s.id.clone());
    let exec_id = exec.id.clone();
    engine_with(repo.clone(), 2, settings(&stub.base_url)).run(run, vec![exec]);

    let stored = repo.execution(&exec_id).unwrap();
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert!(
        stored
            .error_message
            .unwrap()
            .contains("Expected status 200, got 404")
    );
    let response = stored.response.unwrap();
    assert_eq!(response.status_code, 404);
    assert!(response.headers.contains("content-type: application/json"));
}

#[test]
fn timeout_becomes_error_verdict() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let s = support::scenario("doc", "slow", "/slow/report", 200);
    repo.save_scenario(&s).unwrap();

    let mut fast = settings(&stub.base_url);
    fast.timeout = Duration::from_millis(300);
    let engine = engine_with(repo.clone(), 1, fast);

    let run = TestRun::new("r", TriggerKind::Manual);
    let exec = TestExecution::pending(&run.id, s.id.clone());
    let exec_id = exec.id.clone();

    let started = Instant::now();
    let done = engine.run(run, vec![exec]);
    assert!(started.elapsed() < Duration::from_secs(3));

    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(done.stats.total, 1);
    assert_eq!(done.stats.failed, 0);

    let stored = repo.execution(&exec_id).unwrap();
    assert_eq!(stored.status, ExecutionStatus::Error);
    assert!(stored.error_message.unwrap().contains("timed out"));
    assert!(stored.response.is_none());
}

#[test]
fn one_error_does_not_affect_siblings() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let ok_url = format!("{}/status/200/a", stub.base_url);
    let ok = support::scenario("doc", "ok", &ok_url, 200);
    let refused = support::scenario("doc", "refused", "http://127.0.0.1:1/nothing", 200);
    repo.save_scenario(&ok).unwrap();
    repo.save_scenario(&refused).unwrap();
    let mut no_base = settings(&stub.base_url);
    no_base.base_url = None;

    let run = TestRun::new("r", TriggerKind::Manual);
    let execs = vec![
        TestExecution::pending(&run.id, ok.id.clone()),
        TestExecution::pending(&run.id, refused.id.clone()),
        TestExecution::pending(&run.id, "no-such-scenario"),
    ];
    let done = engine_with(repo.clone(), 3, no_base).run(run, execs);

    assert_eq!(done.stats.total, 3);
    assert_eq!(done.stats.passed, 1);
    let stored = repo.executions(&done.id).unwrap();
    let errors: Vec<_> = stored
        .iter()
        .filter(|e| e.status == ExecutionStatus::Error)
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.error_message.is_some()));
}

#[test]
fn unauthorized_scenarios_omit_credentials() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let authed = support::scenario("doc", "authed", "/status/200/me", 200);
    let mut anonymous = support::scenario("doc", "anonymous", "/status/200/me", 200);
    anonymous.requires_auth = false;
    repo.save_scenario(&authed).unwrap();
    repo.save_scenario(&anonymous).unwrap();

    let run = TestRun::new("r", TriggerKind::Manual);
    let execs = vec![
        TestExecution::pending(&run.id, authed.id.clone()),
        TestExecution::pending(&run.id, anonymous.id.clone()),
    ];
    let done = engine_with(repo.clone(), 2, settings(&stub.base_url)).run(run, execs);

    for exec in repo.executions(&done.id).unwrap() {
        let body = exec.response.unwrap().body.unwrap();
        let echo: serde_json::Value = serde_json::from_str(&body).unwrap();
        let sent = exec.request.unwrap().headers;
        assert_eq!(sent.get("Accept").map(String::as_str), Some("application/json"));
        if exec.scenario_id == anonymous.id {
            assert!(echo["authorization"].is_null());
            assert!(!sent.contains_key("Authorization"));
        } else {
            assert_eq!(echo["authorization"], "Bearer secret");
        }
    }
}

#[test]
fn malformed_json_body_fails_schema_check() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let mut s = support::scenario("doc", "text", "/text/plain", 200);
    s.expected_schema = Some("User".into());
    repo.save_scenario(&s).unwrap();

    let run = TestRun::new("r", TriggerKind::Manual);
    let done = engine_with(repo.clone(), 1, settings(&stub.base_url))
        .run(run.clone(), vec![TestExecution::pending(&run.id, s.id.clone())]);
    assert_eq!(done.stats.failed, 1);
}

/// In-memory repository with injected faults.
#[derive(Default)]
struct Faulty {
    inner: InMemoryRepository,
    /// Reject the final write of a completed run
    reject_completed_run: bool,
    /// Panic when this scenario is read
    panic_on_scenario: Option<&'static str>,
}

impl Faulty {
    fn rejecting_completed_run() -> Self {
        Self {
            reject_completed_run: true,
            ..Self::default()
        }
    }

    fn panicking_on(scenario_id: &'static str) -> Self {
        Self {
            panic_on_scenario: Some(scenario_id),
            ..Self::default()
        }
    }
}

impl Repository for Faulty {
    fn save_document(&self, d: &apisuite_core::ApiDocument) -> Result<(), RepositoryError> {
        self.inner.save_document(d)
    }
    fn document(&self, id: &str) -> Result<apisuite_core::ApiDocument, RepositoryError> {
        self.inner.document(id)
    }
    fn documents(&self) -> Result<Vec<apisuite_core::ApiDocument>, RepositoryError> {
        self.inner.documents()
    }
    fn delete_document(&self, id: &str) -> Result<(), RepositoryError> {
        self.inner.delete_document(id)
    }
    fn save_bundle(&self, b: &apisuite_core::FeatureBundle) -> Result<(), RepositoryError> {
        self.inner.save_bundle(b)
    }
    fn bundle(&self, id: &str) -> Result<apisuite_core::FeatureBundle, RepositoryError> {
        self.inner.bundle(id)
    }
    fn bundles(&self, doc: &str) -> Result<Vec<apisuite_core::FeatureBundle>, RepositoryError> {
        self.inner.bundles(doc)
    }
    fn delete_bundle(&self, id: &str) -> Result<(), RepositoryError> {
        self.inner.delete_bundle(id)
    }
    fn save_scenario(&self, s: &apisuite_core::TestScenario) -> Result<(), RepositoryError> {
        self.inner.save_scenario(s)
    }
    fn scenario(&self, id: &str) -> Result<apisuite_core::TestScenario, RepositoryError> {
        if self.panic_on_scenario == Some(id) {
            panic!("corrupt scenario record {id}");
        }
        self.inner.scenario(id)
    }
    fn scenarios(&self, doc: &str) -> Result<Vec<apisuite_core::TestScenario>, RepositoryError> {
        self.inner.scenarios(doc)
    }
    fn delete_scenario(&self, id: &str) -> Result<(), RepositoryError> {
        self.inner.delete_scenario(id)
    }
    fn save_run(&self, run: &TestRun) -> Result<(), RepositoryError> {
        if self.reject_completed_run && run.status == RunStatus::Completed {
            return Err(RepositoryError::Storage("disk full".into()));
        }
        self.inner.save_run(run)
    }
    fn run(&self, id: &str) -> Result<TestRun, RepositoryError> {
        self.inner.run(id)
    }
    fn delete_run(&self, id: &str) -> Result<(), RepositoryError> {
        self.inner.delete_run(id)
    }
    fn save_execution(&self, e: &TestExecution) -> Result<(), RepositoryError> {
        self.inner.save_execution(e)
    }
    fn execution(&self, id: &str) -> Result<TestExecution, RepositoryError> {
        self.inner.execution(id)
    }
    fn executions(&self, run_id: &str) -> Result<Vec<TestExecution>, RepositoryError> {
        self.inner.executions(run_id)
    }
    fn delete_execution(&self, id: &str) -> Result<(), RepositoryError> {
        self.inner.delete_execution(id)
    }
}

#[test]
fn finalize_failure_fails_run_but_keeps_stats() {
    let stub = support::spawn();
    let repo = Arc::new(Faulty::rejecting_completed_run());
    let s = support::scenario("doc", "ok", "/status/200/x", 200);
    repo.save_scenario(&s).unwrap();

    let run = TestRun::new("r", TriggerKind::Manual);
    let execs = vec![
        TestExecution::pending(&run.id, s.id.clone()),
        TestExecution::pending(&run.id, s.id.clone()),
    ];
    let done = engine_with(repo.clone(), 2, settings(&stub.base_url)).run(run, execs);

    assert_eq!(done.status, RunStatus::Failed);
    assert!(done.error_message.as_deref().unwrap().contains("disk full"));
    assert_eq!(done.stats.total, 2);
    assert_eq!(done.stats.passed, 2);
    assert_eq!(repo.run(&done.id).unwrap().status, RunStatus::Failed);
}

#[test]
fn serial_pool_gives_same_verdicts() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let run = TestRun::new("serial", TriggerKind::Manual);
    let mut executions = Vec::new();
    for (i, code) in [200, 500, 200].into_iter().enumerate() {
        let s = support::scenario("doc", &format!("s{i}"), &format!("/status/{code}/{i}"), 200);
        repo.save_scenario(&s).unwrap();
        executions.push(TestExecution::pending(&run.id, s.id));
    }
    let engine = ExecutionEngine::new(
        repo.clone(),
        Arc::new(WorkerPool::serial().unwrap()),
        settings(&stub.base_url),
    )
    .unwrap();
    let done = engine.run(run, executions);
    assert_eq!(done.stats.passed, 2);
    assert_eq!(done.stats.failed, 1);
    assert_eq!(stub.peak(), 1);
}

#[test]
fn panicking_execution_becomes_error_and_siblings_finish() {
    let stub = support::spawn();
    let repo = Arc::new(Faulty::panicking_on("scn-boom"));
    let ok = support::scenario("doc", "ok", "/status/200/a", 200);
    let boom = support::scenario("doc", "boom", "/status/200/b", 200);
    repo.save_scenario(&ok).unwrap();
    repo.save_scenario(&boom).unwrap();

    let run = TestRun::new("r", TriggerKind::Manual);
    let execs = vec![
        TestExecution::pending(&run.id, ok.id.clone()),
        TestExecution::pending(&run.id, boom.id.clone()),
        TestExecution::pending(&run.id, ok.id.clone()),
    ];
    let done = engine_with(repo.clone(), 2, settings(&stub.base_url)).run(run, execs);

    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(done.stats.total, 3);
    assert_eq!(done.stats.passed, 2);
    let stored = repo.executions(&done.id).unwrap();
    let panicked = stored.iter().find(|e| e.scenario_id == boom.id).unwrap();
    assert_eq!(panicked.status, ExecutionStatus::Error);
    assert!(panicked.finished_at.is_some());
    assert!(
        panicked
            .error_message
            .as_deref()
            .unwrap()
            .contains("corrupt scenario record scn-boom")
    );
}

#[test]
fn unreadable_body_keeps_status_and_headers() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let s = support::scenario("doc", "cut", "/truncated/503/orders", 200);
    repo.save_scenario(&s).unwrap();

    let run = TestRun::new("r", TriggerKind::Manual);
    let exec = TestExecution::pending(&run.id, s.id.clone());
    let exec_id = exec.id.clone();
    let done = engine_with(repo.clone(), 1, settings(&stub.base_url)).run(run, vec![exec]);
    assert_eq!(done.stats.total, 1);

    let stored = repo.execution(&exec_id).unwrap();
    assert_eq!(stored.status, ExecutionStatus::Error);
    assert!(stored.error_message.unwrap().contains("Cannot read response body"));
    let response = stored.response.unwrap();
    assert_eq!(response.status_code, 503);
    assert!(response.headers.contains("x-trace: stub"));
    assert!(response.body.is_none());
}

#[test]
fn configured_base_wins_over_document_server() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let s = support::scenario("doc", "prod", "http://127.0.0.1:1/status/200/x", 200);
    repo.save_scenario(&s).unwrap();

    let run = TestRun::new("r", TriggerKind::Manual);
    let exec = TestExecution::pending(&run.id, s.id.clone());
    let exec_id = exec.id.clone();
    engine_with(repo.clone(), 1, settings(&stub.base_url)).run(run, vec![exec]);

    let stored = repo.execution(&exec_id).unwrap();
    assert_eq!(stored.status, ExecutionStatus::Passed);
    assert_eq!(
        stored.request.unwrap().url,
        format!("{}/status/200/x", stub.base_url)
    );
}

#[test]
fn unsendable_header_is_not_recorded_as_sent() {
    let stub = support::spawn();
    let repo = Arc::new(InMemoryRepository::new());
    let s = support::scenario("doc", "hdr", "/status/200/h", 200);
    repo.save_scenario(&s).unwrap();

    let mut bad = settings(&stub.base_url);
    bad.headers.insert("X-Api-Key".to_string(), "line\nbreak".to_string());

    let run = TestRun::new("r", TriggerKind::Manual);
    let exec = TestExecution::pending(&run.id, s.id.clone());
    let exec_id = exec.id.clone();
    engine_with(repo.clone(), 1, bad).run(run, vec![exec]);

    let stored = repo.execution(&exec_id).unwrap();
    let request = stored.request.unwrap();
    assert!(!request.headers.contains_key("X-Api-Key"));
    assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("Bearer secret"));
    assert!(stored.error_message.unwrap().contains("Header 'X-Api-Key' not sent"));
}
