//! Data model - scenarios, bundles, runs and executions

mod run;
mod scenario;

pub use run::{
    ExecutionStatus, RequestSnapshot, ResponseSnapshot, RunStats, RunStatus, TestExecution,
    TestRun, TriggerKind,
};
pub use scenario::{FeatureBundle, SuiteGroup, TestScenario};
