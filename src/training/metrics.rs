//! Regression error metrics

use crate::error::{SvrError, Result};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error criterion used both as the tuning objective and the held-out score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Mean absolute error
    Mae,
    /// Mean squared error
    Mse,
}

impl Default for Criterion {
    fn default() -> Self {
        Criterion::Mse
    }
}

impl Criterion {
    /// Compute the error between predictions and ground truth.
    ///
    /// Both sequences must have the same length. The result is never negative;
    /// two empty sequences score `0.0`.
    pub fn evaluate(&self, y_pred: ArrayView1<f64>, y_true: ArrayView1<f64>) -> Result<f64> {
        if y_pred.len() != y_true.len() {
            return Err(SvrError::LengthMismatch {
                predictions: y_pred.len(),
                truth: y_true.len(),
            });
        }
        if y_true.is_empty() {
            return Ok(0.0);
        }

        let n = y_true.len() as f64;
        let deviations = y_pred.iter().zip(y_true.iter()).map(|(p, t)| p - t);

        let value = match self {
            Criterion::Mae => deviations.map(f64::abs).sum::<f64>() / n,
            Criterion::Mse => deviations.map(|d| d * d).sum::<f64>() / n,
        };
        Ok(value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Mae => "mae",
            Criterion::Mse => "mse",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = SvrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mae" => Ok(Criterion::Mae),
            "mse" => Ok(Criterion::Mse),
            other => Err(SvrError::InvalidRequest(format!("unknown criterion '{}'", other))),
        }
    }
}
