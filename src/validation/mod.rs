//! Training requests, validation regimes and their results

mod orchestrator;
mod request;
mod results;

pub use orchestrator::ValidationOrchestrator;
pub use request::{
    TrainingRequest, ValidationMode, MAX_N_ITER, MAX_SEED, MIN_DEGREE, MIN_INIT_POINTS, MIN_N_ITER,
    N_FOLDS, VALIDATION_FRACTION,
};
pub use results::{
    ErrorMeasure, ErrorValue, FoldResult, HyperparameterRecord, HyperparameterSet, TrainedArtifact,
    TrainingOutput, TrialHistory,
};
