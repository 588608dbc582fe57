//! Model training module
//!
//! - [`svr`]: epsilon-SVR fitted by dual coordinate descent
//! - [`metrics`]: MAE / MSE evaluation
//! - [`cross_validation`]: shuffled k-fold and hold-out partitioning

pub mod cross_validation;
pub mod metrics;
pub mod svr;

pub use cross_validation::{CrossValidator, CVSplit};
pub use metrics::Criterion;
pub use svr::{Gamma, Kernel, KernelFunction, SolverConfig, SupportVectorRegressor, SvrParams};
