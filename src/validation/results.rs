//! Records produced by a training run and persisted by the owning algorithm

use crate::error::{SvrError, Result};
use crate::optimizer::OptimizationTrial;
use crate::training::{Criterion, Kernel, SupportVectorRegressor, SvrParams};
use serde::{Deserialize, Serialize};

use super::request::{ValidationMode, N_FOLDS};

/// Hyperparameters of a fitted model, `c` already exponentiated
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HyperparameterRecord {
    pub c: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<u32>,
    pub kernel: Kernel,
}

impl From<&SvrParams> for HyperparameterRecord {
    fn from(params: &SvrParams) -> Self {
        Self {
            c: params.c,
            degree: params.degree,
            kernel: params.kernel,
        }
    }
}

/// One record per model: a single one or one per fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HyperparameterSet {
    Single(HyperparameterRecord),
    Folds(Vec<HyperparameterRecord>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorValue {
    Scalar(f64),
    Folds(Vec<f64>),
}

/// Held-out error of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMeasure {
    #[serde(alias = "type")]
    pub criterion: Criterion,
    pub value: ErrorValue,
}

impl ErrorMeasure {
    /// Scalar value, or the mean over folds
    pub fn mean(&self) -> f64 {
        match &self.value {
            ErrorValue::Scalar(v) => *v,
            ErrorValue::Folds(values) if values.is_empty() => f64::NAN,
            ErrorValue::Folds(values) => values.iter().sum::<f64>() / values.len() as f64,
        }
    }
}

/// Ordered tuning history: one sequence, or one per fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrialHistory {
    Single(Vec<OptimizationTrial>),
    Folds(Vec<Vec<OptimizationTrial>>),
}

impl TrialHistory {
    /// Objective evaluations across every tuning pass
    pub fn total_trials(&self) -> usize {
        match self {
            TrialHistory::Single(trials) => trials.len(),
            TrialHistory::Folds(folds) => folds.iter().map(Vec::len).sum(),
        }
    }
}

/// Directly usable inference artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "models", rename_all = "snake_case")]
pub enum TrainedArtifact {
    Single(SupportVectorRegressor),
    /// One model per fold, in fold order; never merged
    Ensemble(Vec<SupportVectorRegressor>),
}

impl TrainedArtifact {
    pub fn ensemble(models: Vec<SupportVectorRegressor>) -> Result<Self> {
        if models.len() != N_FOLDS {
            return Err(SvrError::Training(format!(
                "an ensemble holds exactly {} models, got {}",
                N_FOLDS,
                models.len()
            )));
        }
        Ok(TrainedArtifact::Ensemble(models))
    }

    pub fn models(&self) -> &[SupportVectorRegressor] {
        match self {
            TrainedArtifact::Single(model) => std::slice::from_ref(model),
            TrainedArtifact::Ensemble(models) => models,
        }
    }

    pub fn is_ensemble(&self) -> bool {
        matches!(self, TrainedArtifact::Ensemble(_))
    }
}

/// Outcome of one fold in k-fold mode
#[derive(Debug, Clone)]
pub struct FoldResult {
    pub fold: usize,
    pub model: SupportVectorRegressor,
    pub hyperparameters: HyperparameterRecord,
    pub error: f64,
    pub history: Vec<OptimizationTrial>,
}

/// Everything a successful run produces, committed as one unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutput {
    pub mode: ValidationMode,
    pub artifact: TrainedArtifact,
    /// Absent in full-train mode
    pub error_measure: Option<ErrorMeasure>,
    pub history: TrialHistory,
    pub hyperparameters: HyperparameterSet,
}

impl TrainingOutput {
    /// Assemble the k-fold output from per-fold results in fold order
    pub fn from_folds(criterion: Criterion, mut folds: Vec<FoldResult>) -> Result<Self> {
        folds.sort_by_key(|f| f.fold);

        let mut models = Vec::with_capacity(folds.len());
        let mut errors = Vec::with_capacity(folds.len());
        let mut histories = Vec::with_capacity(folds.len());
        let mut records = Vec::with_capacity(folds.len());
        for fold in folds {
            models.push(fold.model);
            errors.push(fold.error);
            histories.push(fold.history);
            records.push(fold.hyperparameters);
        }

        Ok(Self {
            mode: ValidationMode::KFold,
            artifact: TrainedArtifact::ensemble(models)?,
            error_measure: Some(ErrorMeasure { criterion, value: ErrorValue::Folds(errors) }),
            history: TrialHistory::Folds(histories),
            hyperparameters: HyperparameterSet::Folds(records),
        })
    }
}
