//! Epsilon-insensitive support vector regression
//!
//! The dual problem is solved by greedy coordinate descent on
//! `beta = alpha - alpha*`. The intercept is folded into the kernel
//! (`Q = K + 1`) which removes the equality constraint, so every step is a
//! closed-form soft-threshold followed by a clip to `[-C, C]`.

use crate::error::{SvrError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Rows at which the kernel matrix is filled in parallel
const PARALLEL_KERNEL_ROWS: usize = 100;

/// Kernel family selected for a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Linear,
    Poly,
    Rbf,
    Sigmoid,
}

impl Default for Kernel {
    fn default() -> Self {
        Kernel::Rbf
    }
}

impl Kernel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kernel::Linear => "linear",
            Kernel::Poly => "poly",
            Kernel::Rbf => "rbf",
            Kernel::Sigmoid => "sigmoid",
        }
    }

    /// Whether the polynomial degree takes part in the search
    pub fn uses_degree(&self) -> bool {
        matches!(self, Kernel::Poly)
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kernel {
    type Err = SvrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Kernel::Linear),
            "poly" | "polynomial" => Ok(Kernel::Poly),
            "rbf" => Ok(Kernel::Rbf),
            "sigmoid" => Ok(Kernel::Sigmoid),
            other => Err(SvrError::InvalidRequest(format!("unknown kernel '{}'", other))),
        }
    }
}

/// Kernel function with its resolved coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KernelFunction {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, gamma: f64, coef0: f64 },
    /// K(x, y) = exp(-γ * ||x - y||²)
    Rbf { gamma: f64 },
    /// K(x, y) = tanh(γ * x · y + r)
    Sigmoid { gamma: f64, coef0: f64 },
}

impl KernelFunction {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            KernelFunction::Linear => a.dot(&b),
            KernelFunction::Polynomial { degree, gamma, coef0 } => {
                (gamma * a.dot(&b) + coef0).powi((*degree).min(i32::MAX as u32) as i32)
            }
            KernelFunction::Rbf { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * norm_sq).exp()
            }
            KernelFunction::Sigmoid { gamma, coef0 } => (gamma * a.dot(&b) + coef0).tanh(),
        }
    }
}

/// Kernel coefficient policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// 1 / (n_features * Var(X))
    Scale,
    /// 1 / n_features
    Auto,
    Value(f64),
}

impl Gamma {
    fn resolve(&self, x: ArrayView2<f64>) -> f64 {
        let n_features = x.ncols().max(1) as f64;
        match self {
            Gamma::Scale => {
                let var = x.var(0.0);
                if var > 0.0 && var.is_finite() {
                    1.0 / (n_features * var)
                } else {
                    1.0
                }
            }
            Gamma::Auto => 1.0 / n_features,
            Gamma::Value(g) => *g,
        }
    }
}

/// Solver settings shared by every fit of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Width of the epsilon-insensitive tube
    pub epsilon: f64,
    /// Stopping tolerance on the largest coordinate step
    pub tol: f64,
    /// Hard cap on coordinate updates; hitting it is not an error
    pub max_iter: usize,
    pub gamma: Gamma,
    pub coef0: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            tol: 1e-3,
            max_iter: 5000,
            gamma: Gamma::Scale,
            coef0: 0.0,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_gamma(mut self, gamma: Gamma) -> Self {
        self.gamma = gamma;
        self
    }
}

/// Hyperparameters of a single fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvrParams {
    /// Regularization strength (already exponentiated)
    pub c: f64,
    pub kernel: Kernel,
    /// Rounded polynomial degree, only meaningful for `Kernel::Poly`
    pub degree: Option<u32>,
}

impl SvrParams {
    /// Build from a log-scale regularization value and an unrounded degree
    pub fn from_log_c(log_c: f64, kernel: Kernel, degree: Option<f64>) -> Self {
        let degree = if kernel.uses_degree() {
            degree.map(|d| d.round().max(1.0) as u32)
        } else {
            None
        };
        Self { c: log_c.exp(), kernel, degree }
    }
}

/// Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportVectorRegressor {
    params: SvrParams,
    config: SolverConfig,
    kernel_fn: Option<KernelFunction>,
    support_vectors: Option<Array2<f64>>,
    dual_coef: Option<Array1<f64>>,
    intercept: f64,
    n_features: usize,
    n_iter: usize,
    converged: bool,
    is_fitted: bool,
}

impl SupportVectorRegressor {
    pub fn new(params: SvrParams, config: SolverConfig) -> Self {
        Self {
            params,
            config,
            kernel_fn: None,
            support_vectors: None,
            dual_coef: None,
            intercept: 0.0,
            n_features: 0,
            n_iter: 0,
            converged: false,
            is_fitted: false,
        }
    }

    /// Fit on `x` (rows are samples) and `y`.
    ///
    /// Stops after `max_iter` coordinate updates even if the KKT tolerance was
    /// not reached; the partially optimized model is kept.
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        let n = x.nrows();
        if n == 0 {
            return Err(SvrError::Training("cannot fit on an empty training set".to_string()));
        }
        if y.len() != n {
            return Err(SvrError::LengthMismatch { predictions: n, truth: y.len() });
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(SvrError::Training(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVR kernel matrix. \
                 Consider subsampling.",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        if !(self.params.c > 0.0 && self.params.c.is_finite()) {
            return Err(SvrError::Training(format!("C must be positive and finite, got {}", self.params.c)));
        }

        let kernel_fn = self.resolve_kernel(x)?;
        let mut q = compute_kernel_matrix(&kernel_fn, x);
        q.mapv_inplace(|v| v + 1.0);
        if q.iter().any(|v| !v.is_finite()) {
            return Err(SvrError::Training("kernel matrix contains non-finite values".to_string()));
        }

        let c = self.params.c;
        let eps = self.config.epsilon;
        let mut beta: Array1<f64> = Array1::zeros(n);
        // g = Q beta - y
        let mut grad: Array1<f64> = y.mapv(|v| -v);

        let mut converged = false;
        let mut iter = 0;
        while iter < self.config.max_iter {
            let mut best_idx = 0;
            let mut best_violation = 0.0;
            let mut best_value = beta[0];

            for i in 0..n {
                let qii = q[[i, i]];
                let z = beta[i] - grad[i] / qii;
                let shrunk = z.signum() * (z.abs() - eps / qii).max(0.0);
                let candidate = shrunk.clamp(-c, c);
                let violation = (candidate - beta[i]).abs() * qii;
                if violation > best_violation {
                    best_violation = violation;
                    best_idx = i;
                    best_value = candidate;
                }
            }

            if best_violation < self.config.tol {
                converged = true;
                break;
            }

            let delta = best_value - beta[best_idx];
            beta[best_idx] = best_value;
            grad.scaled_add(delta, &q.column(best_idx));
            iter += 1;
        }

        if !converged {
            warn!(
                max_iter = self.config.max_iter,
                c = self.params.c,
                kernel = %self.params.kernel,
                "SVR solver reached iteration cap before converging"
            );
        }

        let support: Vec<usize> = beta
            .iter()
            .enumerate()
            .filter(|(_, b)| b.abs() > 1e-12)
            .map(|(i, _)| i)
            .collect();

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (row, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            dual_coef[row] = beta[idx];
        }

        debug!(n_samples = n, n_support = support.len(), n_iter = iter, converged, "SVR fitted");

        self.intercept = beta.sum();
        self.support_vectors = Some(support_vectors);
        self.dual_coef = Some(dual_coef);
        self.kernel_fn = Some(kernel_fn);
        self.n_features = x.ncols();
        self.n_iter = iter;
        self.converged = converged;
        self.is_fitted = true;
        Ok(())
    }

    fn resolve_kernel(&self, x: ArrayView2<f64>) -> Result<KernelFunction> {
        let gamma = self.config.gamma.resolve(x);
        let kernel_fn = match self.params.kernel {
            Kernel::Linear => KernelFunction::Linear,
            Kernel::Rbf => KernelFunction::Rbf { gamma },
            Kernel::Sigmoid => KernelFunction::Sigmoid { gamma, coef0: self.config.coef0 },
            Kernel::Poly => {
                let degree = self.params.degree.ok_or_else(|| {
                    SvrError::Training("polynomial kernel requires a degree".to_string())
                })?;
                KernelFunction::Polynomial { degree, gamma, coef0: self.config.coef0 }
            }
        };
        Ok(kernel_fn)
    }

    /// Predict target values for same-width feature rows
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(SvrError::NoTrainedModel);
        }
        if x.ncols() != self.n_features {
            return Err(SvrError::Training(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let (Some(kernel_fn), Some(sv), Some(coef)) =
            (self.kernel_fn.as_ref(), self.support_vectors.as_ref(), self.dual_coef.as_ref())
        else {
            return Err(SvrError::NoTrainedModel);
        };

        let predictions = x
            .rows()
            .into_iter()
            .map(|sample| {
                let mut sum = self.intercept;
                for (sv_row, &b) in sv.rows().into_iter().zip(coef.iter()) {
                    sum += b * kernel_fn.eval(sample, sv_row);
                }
                sum
            })
            .collect();

        Ok(predictions)
    }

    pub fn params(&self) -> &SvrParams {
        &self.params
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Compute the symmetric kernel matrix (parallelized for larger inputs)
fn compute_kernel_matrix(kernel_fn: &KernelFunction, x: ArrayView2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut k = Array2::zeros((n, n));

    // For small matrices, sequential is faster due to overhead
    if n < PARALLEL_KERNEL_ROWS {
        for i in 0..n {
            for j in i..n {
                let val = kernel_fn.eval(x.row(i), x.row(j));
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        return k;
    }

    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| (i..n).map(|j| kernel_fn.eval(x.row(i), x.row(j))).collect())
        .collect();

    for (i, row_vals) in rows.into_iter().enumerate() {
        for (offset, val) in row_vals.into_iter().enumerate() {
            let j = i + offset;
            k[[i, j]] = val;
            k[[j, i]] = val;
        }
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec((10, 1), vec![
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0,
        ]).unwrap();
        let y = Array1::from_vec(vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0]);
        (x, y)
    }

    fn params(kernel: Kernel, c: f64) -> SvrParams {
        SvrParams { c, kernel, degree: None }
    }

    #[test]
    fn test_linear_svr_fits_line() {
        let (x, y) = linear_data();
        let mut svr = SupportVectorRegressor::new(params(Kernel::Linear, 100.0), SolverConfig::default());
        svr.fit(x.view(), y.view()).unwrap();

        let predictions = svr.predict(x.view()).unwrap();
        for (pred, actual) in predictions.iter().zip(y.iter()) {
            let error = (pred - actual).abs() / actual;
            assert!(error < 0.5, "Error {} too large for pred={}, actual={}", error, pred, actual);
        }
    }

    #[test]
    fn test_rbf_svr_runs() {
        let (x, y) = linear_data();
        let mut svr = SupportVectorRegressor::new(params(Kernel::Rbf, 10.0), SolverConfig::default());
        svr.fit(x.view(), y.view()).unwrap();
        assert_eq!(svr.predict(x.view()).unwrap().len(), 10);
        assert!(svr.n_support_vectors() > 0);
    }

    #[test]
    fn test_iteration_cap_is_not_an_error() {
        let (x, y) = linear_data();
        let config = SolverConfig::default().with_max_iter(3);
        let mut svr = SupportVectorRegressor::new(params(Kernel::Rbf, 10.0), config);
        svr.fit(x.view(), y.view()).unwrap();
        assert_eq!(svr.n_iter(), 3);
        assert!(!svr.converged());
        assert!(svr.predict(x.view()).is_ok());
    }

    #[test]
    fn test_poly_requires_degree() {
        let (x, y) = linear_data();
        let mut svr = SupportVectorRegressor::new(params(Kernel::Poly, 1.0), SolverConfig::default());
        assert!(svr.fit(x.view(), y.view()).is_err());

        let mut svr = SupportVectorRegressor::new(
            SvrParams { c: 1.0, kernel: Kernel::Poly, degree: Some(2) },
            SolverConfig::default(),
        );
        assert!(svr.fit(x.view(), y.view()).is_ok());
    }

    #[test]
    fn test_from_log_c_rounds_degree() {
        let p = SvrParams::from_log_c(0.0, Kernel::Poly, Some(2.6));
        assert_eq!(p.degree, Some(3));
        assert!((p.c - 1.0).abs() < 1e-12);

        let p = SvrParams::from_log_c(1.0, Kernel::Rbf, Some(2.6));
        assert_eq!(p.degree, None);
    }

    #[test]
    fn test_predict_before_fit() {
        let svr = SupportVectorRegressor::new(params(Kernel::Linear, 1.0), SolverConfig::default());
        let x = array![[1.0]];
        assert!(matches!(svr.predict(x.view()), Err(SvrError::NoTrainedModel)));
    }

    #[test]
    fn test_width_mismatch() {
        let (x, y) = linear_data();
        let mut svr = SupportVectorRegressor::new(params(Kernel::Linear, 1.0), SolverConfig::default());
        svr.fit(x.view(), y.view()).unwrap();
        let wide = array![[1.0, 2.0]];
        assert!(svr.predict(wide.view()).is_err());
    }

    #[test]
    fn test_deterministic_fit() {
        let (x, y) = linear_data();
        let fit = || {
            let mut svr = SupportVectorRegressor::new(params(Kernel::Sigmoid, 2.0), SolverConfig::default());
            svr.fit(x.view(), y.view()).unwrap();
            svr.predict(x.view()).unwrap()
        };
        assert_eq!(fit(), fit());
    }

    #[test]
    fn test_kernel_parse() {
        assert_eq!("poly".parse::<Kernel>().unwrap(), Kernel::Poly);
        assert_eq!("RBF".parse::<Kernel>().unwrap(), Kernel::Rbf);
        assert!("cosine".parse::<Kernel>().is_err());
    }
}
