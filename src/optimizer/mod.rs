//! Hyperparameter optimization module
//!
//! Bayesian optimization with a Gaussian process surrogate over a small,
//! kernel-dependent search space.

mod config;
pub mod gaussian_process;
pub mod search_space;
pub mod tuner;

pub use config::TunerConfig;
pub use gaussian_process::{AcquisitionFunction, GaussianProcess, SurrogateKernel};
pub use search_space::{Bounds, HyperparameterSpace, Point};
pub use tuner::{BayesianTuner, OptimizationTrial, TuningOutcome};
