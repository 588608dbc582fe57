//! Inference configuration

use serde::{Deserialize, Serialize};

/// Configuration for batch prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Rows per batch; larger inputs are split and predicted in parallel
    pub batch_size: usize,

    /// Predict the fold models of an ensemble in parallel
    pub parallel_ensemble: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            parallel_ensemble: true,
        }
    }
}

impl InferenceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_parallel_ensemble(mut self, parallel: bool) -> Self {
        self.parallel_ensemble = parallel;
        self
    }
}
