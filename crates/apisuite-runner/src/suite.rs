//! Suite orchestration - the entry points manual and scheduled triggers call

use std::sync::Arc;

use apisuite_core::model::{
    FeatureBundle, RunStatus, SuiteGroup, TestExecution, TestRun, TestScenario, TriggerKind,
};
use apisuite_core::{ApiDocument, GenerateError, Repository, RepositoryError, generate, plan_retry};

use crate::engine::ExecutionEngine;

#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Tally of one scheduled sweep over all known documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Runs that reached `Completed`
    pub succeeded: u64,
    /// Runs that ended `Failed` or could not be started
    pub failed: u64,
    /// Documents without any generated scenario
    pub skipped: u64,
}

pub struct SuiteRunner {
    repo: Arc<dyn Repository>,
    engine: ExecutionEngine,
}

impl SuiteRunner {
    #[must_use]
    pub fn new(engine: ExecutionEngine) -> Self {
        Self {
            repo: Arc::clone(engine.repository()),
            engine,
        }
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    /// Persist `document`, generate its bundles and persist those plus every scenario.
    ///
    /// # Errors
    ///
    /// Returns error if generation fails (nothing is persisted then) or on storage errors.
    pub fn import(&self, document: &ApiDocument) -> Result<Vec<FeatureBundle>, SuiteError> {
        let bundles = generate(document)?;
        self.repo.save_document(document)?;
        for bundle in &bundles {
            self.repo.save_bundle(bundle)?;
            for scenario in &bundle.scenarios {
                self.repo.save_scenario(scenario)?;
            }
        }
        tracing::info!(
            document = %document.id,
            title = %document.title,
            scenarios = bundles.iter().map(|b| b.scenarios.len()).sum::<usize>(),
            "document imported"
        );
        Ok(bundles)
    }

    /// Run every scenario of a document.
    ///
    /// # Errors
    ///
    /// Returns error if the document is unknown or the run cannot be materialized.
    pub fn run_full_suite(
        &self,
        document_id: &str,
        trigger: TriggerKind,
    ) -> Result<TestRun, SuiteError> {
        let document = self.repo.document(document_id)?;
        let scenarios = self.repo.scenarios(document_id)?;
        let name = format!("{} full suite", document.title);
        self.execute(&name, document_id, trigger, &scenarios)
    }

    /// Run the scenarios of one suite group of a document.
    ///
    /// # Errors
    ///
    /// Returns error if the document is unknown or the run cannot be materialized.
    pub fn run_suite_group(
        &self,
        document_id: &str,
        group: SuiteGroup,
        trigger: TriggerKind,
    ) -> Result<TestRun, SuiteError> {
        let document = self.repo.document(document_id)?;
        let scenarios: Vec<TestScenario> = self
            .repo
            .scenarios(document_id)?
            .into_iter()
            .filter(|s| s.group == group)
            .collect();
        let name = format!("{} {}", document.title, group.title());
        self.execute(&name, document_id, trigger, &scenarios)
    }

    /// Re-run only the `Failed` executions of `run_id` as a new `Retry` run.
    ///
    /// The original run and its executions are left as they are.
    ///
    /// # Errors
    ///
    /// Returns error if the run is unknown or the retry cannot be materialized.
    pub fn retry(&self, run_id: &str) -> Result<TestRun, SuiteError> {
        let original = self.repo.run(run_id)?;
        let executions = self.repo.executions(run_id)?;
        let (run, fresh) = plan_retry(&original, &executions);
        tracing::info!(
            original = %original.id,
            retry = %run.id,
            executions = fresh.len(),
            "retrying failed executions"
        );
        self.submit(run, fresh)
    }

    /// Run the full suite of every known document with at least one scenario.
    ///
    /// # Errors
    ///
    /// Returns error only if the document list cannot be read.
    pub fn scheduled_sweep(&self) -> Result<SweepSummary, SuiteError> {
        let mut summary = SweepSummary::default();
        for document in self.repo.documents()? {
            let has_scenarios = match self.repo.scenarios(&document.id) {
                Ok(s) => !s.is_empty(),
                Err(e) => {
                    tracing::warn!(document = %document.id, error = %e, "cannot list scenarios");
                    summary.failed += 1;
                    continue;
                }
            };
            if !has_scenarios {
                tracing::debug!(document = %document.id, "no scenarios, skipping");
                summary.skipped += 1;
                continue;
            }
            match self.run_full_suite(&document.id, TriggerKind::Scheduled) {
                Ok(run) if run.status == RunStatus::Completed => summary.succeeded += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    tracing::warn!(document = %document.id, error = %e, "scheduled run not started");
                    summary.failed += 1;
                }
            }
        }
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "scheduled sweep finished"
        );
        Ok(summary)
    }

    fn execute(
        &self,
        name: &str,
        document_id: &str,
        trigger: TriggerKind,
        scenarios: &[TestScenario],
    ) -> Result<TestRun, SuiteError> {
        let run = TestRun::new(name, trigger).for_document(document_id);
        let executions = scenarios
            .iter()
            .map(|s| TestExecution::pending(&run.id, s.id.clone()))
            .collect();
        self.submit(run, executions)
    }

    fn submit(&self, run: TestRun, executions: Vec<TestExecution>) -> Result<TestRun, SuiteError> {
        self.repo.save_run(&run)?;
        for execution in &executions {
            self.repo.save_execution(execution)?;
        }
        Ok(self.engine.run(run, executions))
    }
}
