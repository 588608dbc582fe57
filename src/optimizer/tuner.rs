//! Bayesian hyperparameter tuner
//!
//! Runs `init_points` uniformly random evaluations followed by `n_iter`
//! evaluations chosen by maximizing an acquisition function over a Gaussian
//! process fitted to every score observed so far. The objective is always
//! maximized.

use crate::error::{SvrError, Result};
use super::config::TunerConfig;
use super::gaussian_process::GaussianProcess;
use super::search_space::{HyperparameterSpace, Point};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// One evaluated point of a tuning run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationTrial {
    /// Position in evaluation order, starting at 0
    pub index: usize,
    pub hyperparameters: Point,
    pub score: f64,
}

/// Best point and the full ordered history of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningOutcome {
    pub best: OptimizationTrial,
    pub history: Vec<OptimizationTrial>,
    pub duration_secs: f64,
}

/// Sample-efficient maximizer over a [`HyperparameterSpace`]
#[derive(Debug, Clone)]
pub struct BayesianTuner {
    config: TunerConfig,
    space: HyperparameterSpace,
    init_points: usize,
    n_iter: usize,
    seed: Option<u64>,
}

impl BayesianTuner {
    pub fn new(space: HyperparameterSpace, init_points: usize, n_iter: usize) -> Self {
        Self {
            config: TunerConfig::default(),
            space,
            init_points,
            n_iter,
            seed: None,
        }
    }

    pub fn with_config(mut self, config: TunerConfig) -> Self {
        self.config = config;
        self
    }

    /// Fix the random stream; identical seeds reproduce identical runs
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn space(&self) -> &HyperparameterSpace {
        &self.space
    }

    /// Total number of objective evaluations a run performs
    pub fn budget(&self) -> usize {
        self.init_points + self.n_iter
    }

    /// Maximize `objective`.
    ///
    /// Every point is evaluated exactly once. If the objective fails or
    /// returns a non-finite score the whole run fails; no best-so-far result
    /// is returned.
    pub fn maximize<F>(&self, mut objective: F) -> Result<TuningOutcome>
    where
        F: FnMut(&Point) -> Result<f64>,
    {
        if self.budget() == 0 {
            return Err(SvrError::InvalidRequest("tuning budget must be positive".to_string()));
        }

        let start = Instant::now();
        let mut rng = match self.seed {
            Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut history: Vec<OptimizationTrial> = Vec::with_capacity(self.budget());
        let mut best_idx = 0;

        for index in 0..self.budget() {
            let point = if index < self.init_points || history.is_empty() {
                self.space.sample(&mut rng)
            } else {
                self.suggest(&history, history[best_idx].score, &mut rng)?
            };

            let score = objective(&point).map_err(|e| SvrError::OptimizationFailure {
                trial: index,
                reason: e.to_string(),
            })?;
            if !score.is_finite() {
                return Err(SvrError::OptimizationFailure {
                    trial: index,
                    reason: format!("objective returned non-finite score {}", score),
                });
            }

            debug!(trial = index, c = point.c, degree = ?point.degree, score, "Trial evaluated");

            if history.is_empty() || score > history[best_idx].score {
                best_idx = history.len();
            }
            history.push(OptimizationTrial { index, hyperparameters: point, score });
        }

        let best = history[best_idx].clone();
        info!(
            trials = history.len(),
            best_trial = best.index,
            best_score = best.score,
            "Bayesian tuning finished"
        );

        Ok(TuningOutcome {
            best,
            history,
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Pick the next point by maximizing the acquisition over random candidates
    fn suggest(
        &self,
        history: &[OptimizationTrial],
        best_y: f64,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Result<Point> {
        let dim = self.space.dim();
        let x_data: Vec<f64> = history
            .iter()
            .flat_map(|t| self.space.to_unit(&t.hyperparameters))
            .collect();
        let x_train = Array2::from_shape_vec((history.len(), dim), x_data)?;
        let y_train: Array1<f64> = history.iter().map(|t| t.score).collect();

        let mut gp = GaussianProcess::new(self.config.surrogate_kernel.clone())
            .with_noise(self.config.noise);
        gp.fit(x_train, &y_train)?;

        let mut best_candidate = vec![0.5; dim];
        let mut best_acq = f64::NEG_INFINITY;

        for _ in 0..self.config.n_candidates {
            let candidate: Vec<f64> = (0..dim).map(|_| rng.gen::<f64>()).collect();
            let (mean, var) = gp.predict_one(ArrayView1::from(candidate.as_slice()))?;
            let acq = self.config.acquisition.value(mean, var, best_y);

            if acq > best_acq {
                best_acq = acq;
                best_candidate = candidate;
            }
        }

        Ok(self.space.from_unit(&best_candidate))
    }
}
