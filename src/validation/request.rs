//! Training request and its early validation

use crate::error::{SvrError, Result};
use crate::optimizer::{Bounds, HyperparameterSpace};
use crate::training::{Criterion, Kernel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of folds in k-fold mode
pub const N_FOLDS: usize = 5;
/// Share of rows held out in split mode
pub const VALIDATION_FRACTION: f64 = 0.2;
pub const MIN_INIT_POINTS: usize = 16;
pub const MIN_N_ITER: usize = 16;
pub const MAX_N_ITER: usize = 100;
pub const MIN_DEGREE: u32 = 2;
pub const MAX_SEED: u64 = 9_999_999;

/// Validation regime, chosen once per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Five shuffled folds, one tuned model per fold
    #[serde(rename = "5_fold", alias = "k_fold")]
    KFold,
    /// One 80/20 train/validation split
    #[serde(rename = "split")]
    Split,
    /// Tune and fit on every row; no held-out error
    #[serde(rename = "full_train")]
    FullTrain,
}

impl ValidationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMode::KFold => "5_fold",
            ValidationMode::Split => "split",
            ValidationMode::FullTrain => "full_train",
        }
    }

    /// Fewest rows the mode can partition
    pub fn min_rows(&self) -> usize {
        match self {
            ValidationMode::KFold => N_FOLDS,
            ValidationMode::Split => 2,
            ValidationMode::FullTrain => 1,
        }
    }

    /// Number of tuning passes the mode performs
    pub fn tuning_passes(&self) -> usize {
        match self {
            ValidationMode::KFold => N_FOLDS,
            _ => 1,
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationMode {
    type Err = SvrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "5_fold" | "k_fold" | "kfold" => Ok(ValidationMode::KFold),
            "split" => Ok(ValidationMode::Split),
            "full_train" | "full" => Ok(ValidationMode::FullTrain),
            other => Err(SvrError::InvalidRequest(format!("unknown validation mode '{}'", other))),
        }
    }
}

/// Immutable input of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub mode: ValidationMode,
    pub kernel: Kernel,
    #[serde(default)]
    pub criterion: Criterion,
    pub min_ln_c: f64,
    pub max_ln_c: f64,
    #[serde(default)]
    pub min_degree: Option<u32>,
    #[serde(default)]
    pub max_degree: Option<u32>,
    /// Random exploration trials
    pub init_points: usize,
    /// Surrogate-guided trials
    pub n_iter: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl TrainingRequest {
    pub fn new(mode: ValidationMode, kernel: Kernel) -> Self {
        Self {
            mode,
            kernel,
            criterion: Criterion::default(),
            min_ln_c: -2.0,
            max_ln_c: 2.0,
            min_degree: None,
            max_degree: None,
            init_points: MIN_INIT_POINTS,
            n_iter: MIN_N_ITER,
            seed: None,
        }
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_ln_c_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_ln_c = min;
        self.max_ln_c = max;
        self
    }

    pub fn with_degree_bounds(mut self, min: u32, max: u32) -> Self {
        self.min_degree = Some(min);
        self.max_degree = Some(max);
        self
    }

    pub fn with_budget(mut self, init_points: usize, n_iter: usize) -> Self {
        self.init_points = init_points;
        self.n_iter = n_iter;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Objective evaluations per tuning pass
    pub fn budget(&self) -> usize {
        self.init_points + self.n_iter
    }

    /// Check budgets, seed and bounds. Nothing is trained before this passes.
    pub fn validate(&self) -> Result<()> {
        if self.init_points < MIN_INIT_POINTS {
            return Err(SvrError::InvalidRequest(format!(
                "init_points must be at least {}, got {}",
                MIN_INIT_POINTS, self.init_points
            )));
        }
        if !(MIN_N_ITER..=MAX_N_ITER).contains(&self.n_iter) {
            return Err(SvrError::InvalidRequest(format!(
                "n_iter must be between {} and {}, got {}",
                MIN_N_ITER, MAX_N_ITER, self.n_iter
            )));
        }
        if let Some(seed) = self.seed {
            if !(1..=MAX_SEED).contains(&seed) {
                return Err(SvrError::InvalidRequest(format!(
                    "seed must be between 1 and {}, got {}",
                    MAX_SEED, seed
                )));
            }
        }
        self.search_space().map(|_| ())
    }

    /// Search space for the requested kernel, with bounds checked
    pub fn search_space(&self) -> Result<HyperparameterSpace> {
        let c = Bounds::new("ln(C)", self.min_ln_c, self.max_ln_c)?;
        if !self.kernel.uses_degree() {
            return HyperparameterSpace::for_kernel(self.kernel, c, None);
        }

        let (Some(min_degree), Some(max_degree)) = (self.min_degree, self.max_degree) else {
            return Err(SvrError::InvalidRequest(
                "degree is required when the kernel is polynomial".to_string(),
            ));
        };
        if min_degree < MIN_DEGREE {
            return Err(SvrError::InvalidRequest(format!(
                "min_degree must be at least {}, got {}",
                MIN_DEGREE, min_degree
            )));
        }
        let degree = Bounds::new("degree", min_degree as f64, max_degree as f64)?;
        HyperparameterSpace::for_kernel(self.kernel, c, Some(degree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rbf() -> TrainingRequest {
        TrainingRequest::new(ValidationMode::Split, Kernel::Rbf)
    }

    #[test]
    fn test_default_request_is_valid() {
        assert!(rbf().validate().is_ok());
        assert_eq!(rbf().budget(), 32);
    }

    #[test]
    fn test_ln_c_interval() {
        let err = rbf().with_ln_c_bounds(1.0, 1.0).validate().unwrap_err();
        assert!(err.to_string().contains("ln(C)"));
    }

    #[test]
    fn test_budget_limits() {
        assert!(rbf().with_budget(15, 16).validate().is_err());
        assert!(rbf().with_budget(16, 15).validate().is_err());
        assert!(rbf().with_budget(16, 101).validate().is_err());
        assert!(rbf().with_budget(40, 100).validate().is_ok());
    }

    #[test]
    fn test_seed_range() {
        assert!(rbf().with_seed(Some(0)).validate().is_err());
        assert!(rbf().with_seed(Some(10_000_000)).validate().is_err());
        assert!(rbf().with_seed(Some(42)).validate().is_ok());
    }

    #[test]
    fn test_poly_degree_rules() {
        let poly = TrainingRequest::new(ValidationMode::Split, Kernel::Poly);
        assert!(poly.validate().is_err(), "missing degree bounds");

        let mut half = poly.clone();
        half.min_degree = Some(2);
        assert!(half.validate().is_err());

        assert!(poly.clone().with_degree_bounds(1, 3).validate().is_err());
        let err = poly.clone().with_degree_bounds(2, 2).validate().unwrap_err();
        assert!(err.to_string().contains("interval of 'degree'"));

        let space = poly.with_degree_bounds(2, 4).search_space().unwrap();
        assert_eq!(space.dim(), 2);
    }

    #[test]
    fn test_degree_ignored_for_other_kernels() {
        let space = rbf().with_degree_bounds(5, 1).search_space().unwrap();
        assert_eq!(space.dim(), 1);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!("k_fold".parse::<ValidationMode>().unwrap(), ValidationMode::KFold);
        assert_eq!("5_fold".parse::<ValidationMode>().unwrap(), ValidationMode::KFold);
        assert_eq!(serde_json::to_string(&ValidationMode::KFold).unwrap(), "\"5_fold\"");
        let back: ValidationMode = serde_json::from_str("\"k_fold\"").unwrap();
        assert_eq!(back, ValidationMode::KFold);
        assert!("loo".parse::<ValidationMode>().is_err());
    }
}
