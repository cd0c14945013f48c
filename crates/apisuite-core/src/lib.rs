//! apisuite-core: Scenario synthesis, validation and run aggregation
//!
//! This crate turns a parsed API document into grouped test scenarios,
//! validates captured responses against them, and folds execution verdicts
//! into run statistics. Everything here is pure logic; network I/O and
//! concurrency live in `apisuite-runner`.

pub mod aggregate;
pub mod config;
pub mod document;
pub mod export;
pub mod generator;
pub mod model;
pub mod openapi;
pub mod report;
pub mod repository;
pub mod synth;
pub mod validate;

pub use aggregate::{aggregate, error_count, plan_retry};
pub use config::{Config, ConfigError};
pub use document::{ApiDocument, HttpMethod, Operation, Parameter, Schema, SchemaKind};
pub use export::{BASELINE_HEADERS, to_http_file};
pub use generator::{GenerateError, generate};
pub use model::{
    ExecutionStatus, FeatureBundle, RequestSnapshot, ResponseSnapshot, RunStats, RunStatus,
    SuiteGroup, TestExecution, TestRun, TestScenario, TriggerKind,
};
pub use openapi::DocumentError;
pub use report::{ReportError, RunReport};
pub use repository::{InMemoryRepository, Repository, RepositoryError};
pub use synth::{SynthMode, synthesize};
pub use validate::{Validation, validate};
