//! Run aggregation and retry planning

use crate::model::{ExecutionStatus, RunStats, TestExecution, TestRun, TriggerKind};

/// Partition executions by verdict.
///
/// `total` counts every execution; `Error`, `Pending` and `Running` ones appear
/// in no other counter.
#[must_use]
pub fn aggregate(executions: &[TestExecution]) -> RunStats {
    let mut stats = RunStats {
        total: executions.len() as u64,
        ..RunStats::default()
    };
    for exec in executions {
        match exec.status {
            ExecutionStatus::Passed => stats.passed += 1,
            ExecutionStatus::Failed => stats.failed += 1,
            ExecutionStatus::Skipped => stats.skipped += 1,
            ExecutionStatus::Pending | ExecutionStatus::Running | ExecutionStatus::Error => {}
        }
    }
    stats
}

/// Number of executions with an `Error` verdict.
#[must_use]
pub fn error_count(executions: &[TestExecution]) -> u64 {
    executions
        .iter()
        .filter(|e| e.status == ExecutionStatus::Error)
        .count() as u64
}

/// New `Retry` run plus one fresh execution per `Failed` execution of `original`.
///
/// `Error` verdicts are transport problems, not test signals, and are left out.
#[must_use]
pub fn plan_retry(original: &TestRun, executions: &[TestExecution]) -> (TestRun, Vec<TestExecution>) {
    let mut run = TestRun::new(format!("Retry of {}", original.name), TriggerKind::Retry);
    run.document_id = original.document_id.clone();
    run.retry_of = Some(original.id.clone());

    let fresh = executions
        .iter()
        .filter(|e| e.status == ExecutionStatus::Failed)
        .map(|e| TestExecution::pending(&run.id, e.scenario_id.clone()))
        .collect();
    (run, fresh)
}
