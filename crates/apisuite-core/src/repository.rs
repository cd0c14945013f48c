//! Persistence interface and an in-memory implementation
//!
//! Saves are upserts keyed by id; a saved entity is immediately re-readable.
//! List methods return entities in first-insertion order.

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::document::ApiDocument;
use crate::model::{FeatureBundle, TestExecution, TestRun, TestScenario};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("Storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// CRUD by identifier for every persisted entity.
pub trait Repository: Send + Sync {
    fn save_document(&self, doc: &ApiDocument) -> Result<(), RepositoryError>;
    fn document(&self, id: &str) -> Result<ApiDocument, RepositoryError>;
    fn documents(&self) -> Result<Vec<ApiDocument>, RepositoryError>;
    fn delete_document(&self, id: &str) -> Result<(), RepositoryError>;

    fn save_bundle(&self, bundle: &FeatureBundle) -> Result<(), RepositoryError>;
    fn bundle(&self, id: &str) -> Result<FeatureBundle, RepositoryError>;
    fn bundles(&self, document_id: &str) -> Result<Vec<FeatureBundle>, RepositoryError>;
    fn delete_bundle(&self, id: &str) -> Result<(), RepositoryError>;

    fn save_scenario(&self, scenario: &TestScenario) -> Result<(), RepositoryError>;
    fn scenario(&self, id: &str) -> Result<TestScenario, RepositoryError>;
    fn scenarios(&self, document_id: &str) -> Result<Vec<TestScenario>, RepositoryError>;
    fn delete_scenario(&self, id: &str) -> Result<(), RepositoryError>;

    fn save_run(&self, run: &TestRun) -> Result<(), RepositoryError>;
    fn run(&self, id: &str) -> Result<TestRun, RepositoryError>;
    fn delete_run(&self, id: &str) -> Result<(), RepositoryError>;

    fn save_execution(&self, execution: &TestExecution) -> Result<(), RepositoryError>;
    fn execution(&self, id: &str) -> Result<TestExecution, RepositoryError>;
    fn executions(&self, run_id: &str) -> Result<Vec<TestExecution>, RepositoryError>;
    fn delete_execution(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Process-local store. Each entity kind sits behind its own lock, so
/// concurrent execution writes never contend with run writes.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    documents: RwLock<IndexMap<String, ApiDocument>>,
    bundles: RwLock<IndexMap<String, FeatureBundle>>,
    scenarios: RwLock<IndexMap<String, TestScenario>>,
    runs: RwLock<IndexMap<String, TestRun>>,
    executions: RwLock<IndexMap<String, TestExecution>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn get<T: Clone>(
    map: &RwLock<IndexMap<String, T>>,
    kind: &'static str,
    id: &str,
) -> Result<T, RepositoryError> {
    map.read()
        .get(id)
        .cloned()
        .ok_or_else(|| RepositoryError::not_found(kind, id))
}

fn remove<T>(
    map: &RwLock<IndexMap<String, T>>,
    kind: &'static str,
    id: &str,
) -> Result<(), RepositoryError> {
    map.write()
        .shift_remove(id)
        .map(|_| ())
        .ok_or_else(|| RepositoryError::not_found(kind, id))
}

impl Repository for InMemoryRepository {
    fn save_document(&self, doc: &ApiDocument) -> Result<(), RepositoryError> {
        self.documents.write().insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    fn document(&self, id: &str) -> Result<ApiDocument, RepositoryError> {
        get(&self.documents, "document", id)
    }

    fn documents(&self) -> Result<Vec<ApiDocument>, RepositoryError> {
        Ok(self.documents.read().values().cloned().collect())
    }

    fn delete_document(&self, id: &str) -> Result<(), RepositoryError> {
        remove(&self.documents, "document", id)
    }

    fn save_bundle(&self, bundle: &FeatureBundle) -> Result<(), RepositoryError> {
        self.bundles.write().insert(bundle.id.clone(), bundle.clone());
        Ok(())
    }

    fn bundle(&self, id: &str) -> Result<FeatureBundle, RepositoryError> {
        get(&self.bundles, "bundle", id)
    }

    fn bundles(&self, document_id: &str) -> Result<Vec<FeatureBundle>, RepositoryError> {
        Ok(self
            .bundles
            .read()
            .values()
            .filter(|b| b.document_id == document_id)
            .cloned()
            .collect())
    }

    fn delete_bundle(&self, id: &str) -> Result<(), RepositoryError> {
        remove(&self.bundles, "bundle", id)
    }

    fn save_scenario(&self, scenario: &TestScenario) -> Result<(), RepositoryError> {
        self.scenarios
            .write()
            .insert(scenario.id.clone(), scenario.clone());
        Ok(())
    }

    fn scenario(&self, id: &str) -> Result<TestScenario, RepositoryError> {
        get(&self.scenarios, "scenario", id)
    }

    fn scenarios(&self, document_id: &str) -> Result<Vec<TestScenario>, RepositoryError> {
        Ok(self
            .scenarios
            .read()
            .values()
            .filter(|s| s.document_id == document_id)
            .cloned()
            .collect())
    }

    fn delete_scenario(&self, id: &str) -> Result<(), RepositoryError> {
        remove(&self.scenarios, "scenario", id)
    }

    fn save_run(&self, run: &TestRun) -> Result<(), RepositoryError> {
        self.runs.write().insert(run.id.clone(), run.clone());
        Ok(())
    }

    fn run(&self, id: &str) -> Result<TestRun, RepositoryError> {
        get(&self.runs, "run", id)
    }

    fn delete_run(&self, id: &str) -> Result<(), RepositoryError> {
        remove(&self.runs, "run", id)
    }

    fn save_execution(&self, execution: &TestExecution) -> Result<(), RepositoryError> {
        self.executions
            .write()
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }

    fn execution(&self, id: &str) -> Result<TestExecution, RepositoryError> {
        get(&self.executions, "execution", id)
    }

    fn executions(&self, run_id: &str) -> Result<Vec<TestExecution>, RepositoryError> {
        Ok(self
            .executions
            .read()
            .values()
            .filter(|e| e.run_id.as_deref() == Some(run_id))
            .cloned()
            .collect())
    }

    fn delete_execution(&self, id: &str) -> Result<(), RepositoryError> {
        remove(&self.executions, "execution", id)
    }
}
