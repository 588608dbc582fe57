//! Tuner configuration

use serde::{Deserialize, Serialize};
use super::gaussian_process::{AcquisitionFunction, SurrogateKernel};

/// Configuration of the surrogate-guided search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Acquisition function maximized to choose each guided point
    pub acquisition: AcquisitionFunction,

    /// Kernel of the Gaussian process surrogate (inputs live in the unit cube)
    pub surrogate_kernel: SurrogateKernel,

    /// Observation noise added to the surrogate's kernel diagonal
    pub noise: f64,

    /// Random candidates scored by the acquisition function per guided step
    pub n_candidates: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionFunction::default(),
            surrogate_kernel: SurrogateKernel::default(),
            noise: 1e-6,
            n_candidates: 1000,
        }
    }
}

impl TunerConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the acquisition function
    pub fn with_acquisition(mut self, acquisition: AcquisitionFunction) -> Self {
        self.acquisition = acquisition;
        self
    }

    /// Builder method to set the surrogate kernel
    pub fn with_surrogate_kernel(mut self, kernel: SurrogateKernel) -> Self {
        self.surrogate_kernel = kernel;
        self
    }

    /// Builder method to set the number of acquisition candidates
    pub fn with_n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n.max(1);
        self
    }
}
