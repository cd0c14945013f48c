//! apisuite-runner: Concurrent execution of generated API test scenarios
//!
//! A fixed-size [`WorkerPool`] shared by every run, the [`ExecutionEngine`]
//! that drives executions to a verdict, and the [`SuiteRunner`] entry points
//! used by manual and scheduled triggers.

pub mod engine;
pub mod pool;
pub mod suite;

pub use engine::{EngineError, EngineSettings, ExecutionEngine, Outcome};
pub use pool::{PoolError, WorkerPool};
pub use suite::{SuiteError, SuiteRunner, SweepSummary};
