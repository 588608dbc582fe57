//! bayes_svr - Support vector regression with Bayesian hyperparameter tuning
//!
//! This crate trains epsilon-SVR models whose regularization strength (and
//! polynomial degree) are chosen by Bayesian optimization, under one of three
//! validation regimes, and applies the trained artifacts to new data.
//!
//! # Modules
//!
//! ## Core
//! - [`data`] - Feature/target extraction from polars tables, CSV codec
//! - [`training`] - SVR solver, error metrics, train/validation partitioning
//! - [`optimizer`] - Search space, Gaussian process surrogate, Bayesian tuner
//! - [`validation`] - Training requests and the validation orchestrator
//! - [`inference`] - Single-model and fold-ensemble prediction
//!
//! ## Workflow
//! - [`store`] - Blob storage for datasets and artifacts
//! - [`algorithm`] - The owning algorithm entity: status, commit, clear
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core modules
pub mod data;
pub mod training;
pub mod optimizer;
pub mod validation;
pub mod inference;

// Workflow
pub mod store;
pub mod algorithm;

// Services
pub mod cli;

pub use error::{SvrError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{SvrError, Result};

    // Data
    pub use crate::data::{ColumnRoles, Dataset};

    // Training
    pub use crate::training::{Criterion, Kernel, SolverConfig, SupportVectorRegressor, SvrParams};

    // Optimization
    pub use crate::optimizer::{BayesianTuner, HyperparameterSpace, OptimizationTrial, TunerConfig};

    // Validation
    pub use crate::validation::{
        ErrorMeasure, TrainedArtifact, TrainingOutput, TrainingRequest, ValidationMode, ValidationOrchestrator,
    };

    // Inference
    pub use crate::inference::{InferenceConfig, InferenceEngine};

    // Workflow
    pub use crate::algorithm::{Algorithm, AlgorithmSummary, Status};
    pub use crate::store::{BlobStore, FsBlobStore, MemoryBlobStore, StoreConfig};
}
