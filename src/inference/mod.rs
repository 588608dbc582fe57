//! Inference engine module
//!
//! Batch prediction with single models and per-fold ensembles. Large inputs
//! are split into row batches predicted in parallel via rayon.

mod config;
mod engine;

pub use config::InferenceConfig;
pub use engine::InferenceEngine;
