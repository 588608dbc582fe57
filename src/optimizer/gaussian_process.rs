//! Gaussian Process surrogate for Bayesian Optimization
//!
//! GP regression over the unit hypercube plus the acquisition functions used
//! to pick the next query point.

use crate::error::{SvrError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Kernel function types for the Gaussian Process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SurrogateKernel {
    /// Radial Basis Function (Squared Exponential)
    RBF { length_scale: f64 },
    /// Matern kernel with nu in {0.5, 1.5, 2.5}
    Matern { nu: f64, length_scale: f64 },
}

impl Default for SurrogateKernel {
    fn default() -> Self {
        SurrogateKernel::Matern { nu: 2.5, length_scale: 0.2 }
    }
}

/// Compute kernel matrix for given kernel type
fn compute_kernel(x1: &Array2<f64>, x2: &Array2<f64>, kernel: &SurrogateKernel) -> Array2<f64> {
    Array2::from_shape_fn((x1.nrows(), x2.nrows()), |(i, j)| {
        kernel_value(x1.row(i), x2.row(j), kernel)
    })
}

/// Compute kernel value between two points
fn kernel_value(x1: ArrayView1<f64>, x2: ArrayView1<f64>, kernel: &SurrogateKernel) -> f64 {
    let dist_sq: f64 = x1.iter().zip(x2.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
    match kernel {
        SurrogateKernel::RBF { length_scale } => {
            (-0.5 * dist_sq / (length_scale * length_scale)).exp()
        }
        SurrogateKernel::Matern { nu, length_scale } => {
            let r = dist_sq.sqrt() / length_scale;
            if r < 1e-10 {
                return 1.0;
            }

            if (*nu - 0.5).abs() < 1e-6 {
                (-r).exp()
            } else if (*nu - 1.5).abs() < 1e-6 {
                let sqrt3 = 3.0_f64.sqrt();
                (1.0 + sqrt3 * r) * (-sqrt3 * r).exp()
            } else {
                // Matern 5/2; other nu values fall back to it
                let sqrt5 = 5.0_f64.sqrt();
                (1.0 + sqrt5 * r + 5.0 / 3.0 * r * r) * (-sqrt5 * r).exp()
            }
        }
    }
}

/// Acquisition function types. All of them are maximized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum AcquisitionFunction {
    /// Expected Improvement with exploration margin `xi`
    EI { xi: f64 },
    /// Probability of Improvement
    PI { xi: f64 },
    /// Upper Confidence Bound
    UCB { kappa: f64 },
}

impl Default for AcquisitionFunction {
    fn default() -> Self {
        AcquisitionFunction::EI { xi: 0.01 }
    }
}

impl AcquisitionFunction {
    /// Acquisition value of a posterior `(mean, var)` given the best score so far
    pub fn value(&self, mean: f64, var: f64, best_y: f64) -> f64 {
        let std = var.sqrt().max(1e-10);
        match *self {
            AcquisitionFunction::EI { xi } => {
                let improvement = mean - best_y - xi;
                let z = improvement / std;
                improvement * normal_cdf(z) + std * normal_pdf(z)
            }
            AcquisitionFunction::PI { xi } => normal_cdf((mean - best_y - xi) / std),
            AcquisitionFunction::UCB { kappa } => mean + kappa * std,
        }
    }
}

/// Gaussian Process model for regression
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    kernel: SurrogateKernel,
    noise: f64,
    x_train: Option<Array2<f64>>,
    /// Cholesky factor of K + noise*I
    l_chol: Option<Array2<f64>>,
    /// Alpha = L^-T L^-1 y
    alpha: Option<Array1<f64>>,
    /// Mean of training outputs (for normalization)
    y_mean: f64,
    /// Std of training outputs (for normalization)
    y_std: f64,
}

impl GaussianProcess {
    /// Create new GP with given kernel
    pub fn new(kernel: SurrogateKernel) -> Self {
        Self {
            kernel,
            noise: 1e-6,
            x_train: None,
            l_chol: None,
            alpha: None,
            y_mean: 0.0,
            y_std: 1.0,
        }
    }

    /// Set noise level
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.max(1e-10);
        self
    }

    /// Fit the GP to training data
    pub fn fit(&mut self, x: Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = y.len();
        if n == 0 || x.nrows() != n {
            return Err(SvrError::Training(format!(
                "surrogate needs matching non-empty inputs, got {} points and {} scores",
                x.nrows(),
                n
            )));
        }

        self.y_mean = y.mean().unwrap_or(0.0);
        self.y_std = y.std(0.0);
        if self.y_std < 1e-10 {
            self.y_std = 1.0;
        }
        let y_normalized = y.mapv(|yi| (yi - self.y_mean) / self.y_std);

        let mut k = compute_kernel(&x, &x, &self.kernel);
        for i in 0..n {
            k[[i, i]] += self.noise;
        }

        let l = Self::cholesky(&k);
        let alpha = Self::solve_triangular_system(&l, &y_normalized);

        self.x_train = Some(x);
        self.l_chol = Some(l);
        self.alpha = Some(alpha);
        Ok(())
    }

    /// Predict mean and variance at a single point
    pub fn predict_one(&self, x: ArrayView1<f64>) -> Result<(f64, f64)> {
        let (Some(x_train), Some(l), Some(alpha)) =
            (self.x_train.as_ref(), self.l_chol.as_ref(), self.alpha.as_ref())
        else {
            return Err(SvrError::Training("surrogate is not fitted".to_string()));
        };

        let k_star: Array1<f64> = x_train
            .rows()
            .into_iter()
            .map(|row| kernel_value(x, row, &self.kernel))
            .collect();

        let mean = k_star.dot(alpha) * self.y_std + self.y_mean;

        let v = Self::solve_lower_triangular(l, &k_star);
        let k_self = kernel_value(x, x, &self.kernel);
        let var = (k_self - v.dot(&v)).max(1e-10) * self.y_std * self.y_std;

        Ok((mean, var))
    }

    /// Simple Cholesky decomposition
    fn cholesky(a: &Array2<f64>) -> Array2<f64> {
        let n = a.nrows();
        let mut l = Array2::zeros((n, n));

        for i in 0..n {
            for j in 0..=i {
                let mut sum = 0.0;

                if i == j {
                    for k in 0..j {
                        sum += l[[j, k]] * l[[j, k]];
                    }
                    l[[j, j]] = (a[[j, j]] - sum).max(1e-10).sqrt();
                } else {
                    for k in 0..j {
                        sum += l[[i, k]] * l[[j, k]];
                    }
                    l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]].max(1e-10);
                }
            }
        }
        l
    }

    /// Solve L @ x = b for lower triangular L
    fn solve_lower_triangular(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
        let n = b.len();
        let mut x = Array1::zeros(n);

        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= l[[i, j]] * x[j];
            }
            x[i] = sum / l[[i, i]].max(1e-10);
        }
        x
    }

    /// Solve L @ L^T @ x = b
    fn solve_triangular_system(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
        let n = b.len();
        let y = Self::solve_lower_triangular(l, b);

        let mut x = Array1::zeros(n);
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= l[[j, i]] * x[j];
            }
            x[i] = sum / l[[i, i]].max(1e-10);
        }
        x
    }
}

/// Standard normal CDF approximation
fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Standard normal PDF
fn normal_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Error function approximation (Abramowitz and Stegun)
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}
