//! The owning algorithm entity
//!
//! An [`Algorithm`] holds an imported dataset, the chosen column roles and
//! at most one committed training result. Training and prediction take the
//! entity exclusively through an atomic `idle -> running` transition; a
//! second caller gets [`SvrError::Busy`]. A training result is committed as a
//! whole only after its run succeeded, and [`Algorithm::clear`] removes it as
//! a whole.

mod status;

pub use status::Status;

use crate::data::{decode_csv, encode_csv, ColumnRoles, Dataset};
use crate::error::{SvrError, Result};
use crate::inference::InferenceEngine;
use crate::store::{load_json, store_json, BlobHandle, BlobStore};
use crate::validation::{
    ErrorMeasure, HyperparameterSet, TrainedArtifact, TrainingOutput, TrainingRequest, TrialHistory,
    ValidationMode, ValidationOrchestrator,
};
use chrono::{DateTime, Utc};
use ndarray::{Array1, ArrayView2};
use parking_lot::RwLock;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use status::{RunGuard, StatusCell};
use tracing::{info, warn};
use uuid::Uuid;

/// A successful training run as persisted by the algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommittedResult {
    pub mode: ValidationMode,
    /// Blob holding the serialized [`TrainedArtifact`]
    pub artifact: BlobHandle,
    pub error_measure: Option<ErrorMeasure>,
    pub history: TrialHistory,
    pub hyperparameters: HyperparameterSet,
    /// Column roles the artifact was trained with
    pub roles: ColumnRoles,
    pub trained_at: DateTime<Utc>,
}

/// Serialisable snapshot of an algorithm, also used to restore one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmSummary {
    pub id: String,
    pub name: String,
    pub status: Status,
    pub error_message: Option<String>,
    pub dataset: Option<BlobHandle>,
    pub columns: Vec<String>,
    pub roles: Option<ColumnRoles>,
    pub result: Option<CommittedResult>,
}

#[derive(Debug, Default)]
struct AlgorithmState {
    dataset: Option<BlobHandle>,
    columns: Vec<String>,
    roles: Option<ColumnRoles>,
    result: Option<CommittedResult>,
}

/// SVR algorithm with Bayesian hyperparameter tuning
pub struct Algorithm {
    id: String,
    name: String,
    store: Arc<dyn BlobStore>,
    orchestrator: ValidationOrchestrator,
    engine: InferenceEngine,
    status: StatusCell,
    state: RwLock<AlgorithmState>,
}

impl std::fmt::Debug for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Algorithm")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("status", &self.status.get())
            .finish()
    }
}

impl Algorithm {
    pub fn new(name: impl Into<String>, store: Arc<dyn BlobStore>) -> Self {
        Self {
            id: Uuid::new_v4().to_string()[..8].to_string(),
            name: name.into(),
            store,
            orchestrator: ValidationOrchestrator::default(),
            engine: InferenceEngine::default(),
            status: StatusCell::new(Status::Idle, None),
            state: RwLock::new(AlgorithmState::default()),
        }
    }

    /// Rebuild an algorithm from a snapshot. A snapshot taken mid-run is
    /// restored as failed.
    pub fn restore(summary: AlgorithmSummary, store: Arc<dyn BlobStore>) -> Self {
        let (status, message) = match summary.status {
            Status::Running => (Status::Error, Some("run was interrupted".to_string())),
            other => (other, summary.error_message),
        };
        Self {
            id: summary.id,
            name: summary.name,
            store,
            orchestrator: ValidationOrchestrator::default(),
            engine: InferenceEngine::default(),
            status: StatusCell::new(status, message),
            state: RwLock::new(AlgorithmState {
                dataset: summary.dataset,
                columns: summary.columns,
                roles: summary.roles,
                result: summary.result,
            }),
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: ValidationOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_inference_engine(mut self, engine: InferenceEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn error_message(&self) -> Option<String> {
        self.status.message()
    }

    pub fn columns(&self) -> Vec<String> {
        self.state.read().columns.clone()
    }

    pub fn roles(&self) -> Option<ColumnRoles> {
        self.state.read().roles.clone()
    }

    pub fn result(&self) -> Option<CommittedResult> {
        self.state.read().result.clone()
    }

    pub fn summary(&self) -> AlgorithmSummary {
        let state = self.state.read();
        AlgorithmSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status.get(),
            error_message: self.status.message(),
            dataset: state.dataset.clone(),
            columns: state.columns.clone(),
            roles: state.roles.clone(),
            result: state.result.clone(),
        }
    }

    /// Persist a table as the training dataset and record its columns.
    /// Previously chosen roles are dropped since they referred to the old table.
    pub fn import_data(&self, df: &DataFrame) -> Result<Vec<String>> {
        let guard = self.status.begin()?;
        guard.finish(self.import_data_inner(df))
    }

    fn import_data_inner(&self, df: &DataFrame) -> Result<Vec<String>> {
        let columns: Vec<String> = df.get_column_names_str().iter().map(|s| s.to_string()).collect();
        let mut table = df.clone();
        let handle = self.store.store("dataset.csv", encode_csv(&mut table)?)?;

        let previous = {
            let mut state = self.state.write();
            state.columns = columns.clone();
            state.roles = None;
            state.dataset.replace(handle)
        };
        if let Some(old) = previous {
            self.discard_blob(&old);
        }

        info!(algorithm = %self.id, rows = df.height(), columns = columns.len(), "Dataset imported");
        Ok(columns)
    }

    /// Choose feature columns and the target column among the imported ones
    pub fn set_variables(&self, features: Vec<String>, target: impl Into<String>) -> Result<()> {
        let guard = self.status.exclusive()?;
        guard.finish(self.set_variables_inner(features, target.into()))
    }

    fn set_variables_inner(&self, features: Vec<String>, target: String) -> Result<()> {
        let roles = ColumnRoles::new(features, target)?;
        let mut state = self.state.write();
        for name in roles.features.iter().chain(std::iter::once(&roles.target)) {
            if !state.columns.contains(name) {
                return Err(SvrError::ColumnMissing(name.clone()));
            }
        }
        state.roles = Some(roles);
        Ok(())
    }

    pub fn clear_variables(&self) -> Result<()> {
        let guard = self.status.exclusive()?;
        self.state.write().roles = None;
        guard.finish(Ok(()))
    }

    /// Run a training request against the imported dataset and commit the
    /// result. On failure the previously committed result stays in place.
    pub fn train(&self, request: &TrainingRequest) -> Result<TrainingOutput> {
        let guard = self.status.begin()?;
        guard.finish(self.train_inner(request))
    }

    fn train_inner(&self, request: &TrainingRequest) -> Result<TrainingOutput> {
        request.validate()?;

        let (dataset, roles) = {
            let state = self.state.read();
            let dataset = state
                .dataset
                .clone()
                .ok_or_else(|| SvrError::InvalidRequest("no dataset has been imported".to_string()))?;
            let roles = state
                .roles
                .clone()
                .ok_or_else(|| SvrError::InvalidRequest("feature and target columns are not set".to_string()))?;
            (dataset, roles)
        };

        let df = decode_csv(self.store.load(&dataset)?)?;
        let data = Dataset::from_frame(&df, &roles)?;
        let output = self.orchestrator.run(request, data.x.view(), data.y.view())?;

        let artifact = store_json(self.store.as_ref(), "model", &output.artifact)?;
        let committed = CommittedResult {
            mode: output.mode,
            artifact,
            error_measure: output.error_measure.clone(),
            history: output.history.clone(),
            hyperparameters: output.hyperparameters.clone(),
            roles,
            trained_at: Utc::now(),
        };

        let previous = self.state.write().result.replace(committed);
        if let Some(old) = previous {
            self.discard_blob(&old.artifact);
        }

        info!(algorithm = %self.id, mode = %output.mode, "Training result committed");
        Ok(output)
    }

    /// Predict raw feature rows with the committed artifact
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        self.with_committed(|committed| {
            let artifact = self.load_artifact(&committed.artifact)?;
            self.engine.predict(Some(&artifact), x)
        })
    }

    /// Predict a table; the target column as named at training time is
    /// filled with the predictions
    pub fn predict_frame(&self, df: &DataFrame) -> Result<DataFrame> {
        self.with_committed(|committed| {
            let artifact = self.load_artifact(&committed.artifact)?;
            self.engine
                .predict_frame(Some(&artifact), df, &committed.roles.features, &committed.roles.target)
        })
    }

    /// Run `op` against the committed result while holding the entity.
    /// Without a result the status is left untouched.
    fn with_committed<T>(&self, op: impl FnOnce(&CommittedResult) -> Result<T>) -> Result<T> {
        if self.state.read().result.is_none() {
            return Err(SvrError::NoTrainedModel);
        }
        let guard = self.status.begin()?;
        self.run_committed(guard, op)
    }

    fn run_committed<T>(
        &self,
        guard: RunGuard<'_>,
        op: impl FnOnce(&CommittedResult) -> Result<T>,
    ) -> Result<T> {
        // A clear may have landed between the check and the transition
        let Some(committed) = self.result() else {
            return guard.abandon(Err(SvrError::NoTrainedModel));
        };
        guard.finish(op(&committed))
    }

    /// Remove artifact, error measure, history, hyperparameters and mode
    /// together. Rejected while a run is in progress.
    pub fn clear(&self) -> Result<()> {
        let guard = self.status.exclusive()?;
        let previous = self.state.write().result.take();
        if let Some(old) = previous {
            self.discard_blob(&old.artifact);
            info!(algorithm = %self.id, "Training result cleared");
        }
        guard.finish(Ok(()))
    }

    fn load_artifact(&self, handle: &BlobHandle) -> Result<TrainedArtifact> {
        load_json(self.store.as_ref(), handle)
    }

    fn discard_blob(&self, handle: &BlobHandle) {
        if let Err(e) = self.store.remove(handle) {
            warn!(blob = %handle, error = %e, "Failed to remove stale blob");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use crate::training::Kernel;

    fn algorithm() -> (Algorithm, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        (Algorithm::new("svr", store.clone()), store)
    }

    fn frame() -> DataFrame {
        df!(
            "a" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "b" => &[0.5, 0.1, 0.9, 0.3, 0.7, 0.2],
            "y" => &[2.0, 4.1, 5.9, 8.0, 10.2, 11.9]
        )
        .unwrap()
    }

    #[test]
    fn test_import_records_columns() {
        let (algo, store) = algorithm();
        let cols = algo.import_data(&frame()).unwrap();
        assert_eq!(cols, vec!["a", "b", "y"]);
        assert_eq!(algo.status(), Status::Done);
        assert_eq!(store.len(), 1);

        // Re-import replaces the stored table and drops roles
        algo.set_variables(vec!["a".into()], "y").unwrap();
        algo.import_data(&frame()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(algo.roles().is_none());
    }

    #[test]
    fn test_set_variables_checks_columns() {
        let (algo, _) = algorithm();
        algo.import_data(&frame()).unwrap();
        let err = algo.set_variables(vec!["zzz".into()], "y").unwrap_err();
        assert!(matches!(err, SvrError::ColumnMissing(_)));
        assert!(algo.set_variables(vec!["y".into()], "y").is_err());

        algo.set_variables(vec!["a".into(), "b".into()], "y").unwrap();
        assert_eq!(algo.roles().unwrap().target, "y");
        assert_eq!(algo.status(), Status::Done, "variable changes keep the status");

        algo.clear_variables().unwrap();
        assert!(algo.roles().is_none());
    }

    #[test]
    fn test_train_without_roles_fails() {
        let (algo, _) = algorithm();
        algo.import_data(&frame()).unwrap();
        let request = TrainingRequest::new(ValidationMode::FullTrain, Kernel::Linear);
        let err = algo.train(&request).unwrap_err();
        assert!(matches!(err, SvrError::InvalidRequest(_)));
        assert_eq!(algo.status(), Status::Error);
        assert!(algo.error_message().unwrap().contains("not set"));
    }

    #[test]
    fn test_predict_without_model_keeps_status() {
        let (algo, _) = algorithm();
        algo.import_data(&frame()).unwrap();
        let x = ndarray::Array2::<f64>::zeros((1, 2));
        assert!(matches!(algo.predict(x.view()), Err(SvrError::NoTrainedModel)));
        assert!(matches!(algo.predict_frame(&frame()), Err(SvrError::NoTrainedModel)));
        assert_eq!(algo.status(), Status::Done);
    }

    #[test]
    fn test_result_cleared_after_transition() {
        let (algo, _) = algorithm();
        algo.import_data(&frame()).unwrap();

        // The entity is taken while no result is committed any more
        let guard = algo.status.begin().unwrap();
        let outcome = algo.run_committed(guard, |_| Ok(()));
        assert!(matches!(outcome, Err(SvrError::NoTrainedModel)));
        assert_eq!(algo.status(), Status::Done);
        assert_eq!(algo.error_message(), None);
    }

    #[test]
    fn test_summary_roundtrip() {
        let (algo, store) = algorithm();
        algo.import_data(&frame()).unwrap();
        algo.set_variables(vec!["a".into()], "y").unwrap();

        let json = serde_json::to_string(&algo.summary()).unwrap();
        let summary: AlgorithmSummary = serde_json::from_str(&json).unwrap();
        let restored = Algorithm::restore(summary, store);
        assert_eq!(restored.id(), algo.id());
        assert_eq!(restored.roles(), algo.roles());
        assert_eq!(restored.status(), Status::Done);
    }
}
