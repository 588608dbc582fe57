//! Hyperparameter search space, keyed by kernel family

use crate::error::{SvrError, Result};
use crate::training::Kernel;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Closed interval searched for one hyperparameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    /// Create bounds, rejecting empty or non-finite intervals
    pub fn new(name: &str, low: f64, high: f64) -> Result<Self> {
        if !low.is_finite() || !high.is_finite() {
            return Err(SvrError::InvalidRequest(format!(
                "bounds of '{}' must be finite, got [{}, {}]",
                name, low, high
            )));
        }
        if low >= high {
            return Err(SvrError::InvalidRequest(format!(
                "the interval of '{}' is not valid: min ({}) must be smaller than max ({})",
                name, low, high
            )));
        }
        if !(high - low).is_finite() {
            return Err(SvrError::InvalidRequest(format!(
                "the interval of '{}' is too wide: [{}, {}]",
                name, low, high
            )));
        }
        Ok(Self { low, high })
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    fn sample(&self, rng: &mut impl Rng) -> f64 {
        rng.gen::<f64>() * self.width() + self.low
    }

    fn to_unit(&self, v: f64) -> f64 {
        (v - self.low) / self.width()
    }

    fn from_unit(&self, u: f64) -> f64 {
        self.low + u.clamp(0.0, 1.0) * self.width()
    }
}

/// A point of the search space as seen by the objective.
///
/// `c` is the natural log of the regularization strength. `degree` is the
/// continuous, unrounded polynomial degree and is present only when the
/// space searches it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub c: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<f64>,
}

/// Bounded search domain. Each variant fixes the arity of the objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema", rename_all = "snake_case")]
pub enum HyperparameterSpace {
    /// Regularization only (linear, rbf, sigmoid kernels)
    Regularization { c: Bounds },
    /// Regularization plus polynomial degree (poly kernel)
    Polynomial { c: Bounds, degree: Bounds },
}

impl HyperparameterSpace {
    /// Build the space for `kernel`. Degree bounds are required for the
    /// polynomial kernel and ignored otherwise.
    pub fn for_kernel(kernel: Kernel, c: Bounds, degree: Option<Bounds>) -> Result<Self> {
        match (kernel.uses_degree(), degree) {
            (true, Some(degree)) => Ok(HyperparameterSpace::Polynomial { c, degree }),
            (true, None) => Err(SvrError::InvalidRequest(
                "degree bounds are required when the kernel is polynomial".to_string(),
            )),
            (false, _) => Ok(HyperparameterSpace::Regularization { c }),
        }
    }

    /// Number of searched dimensions (1 or 2)
    pub fn dim(&self) -> usize {
        self.bounds().len()
    }

    pub fn names(&self) -> &'static [&'static str] {
        match self {
            HyperparameterSpace::Regularization { .. } => &["c"],
            HyperparameterSpace::Polynomial { .. } => &["c", "degree"],
        }
    }

    pub fn bounds(&self) -> Vec<Bounds> {
        match self {
            HyperparameterSpace::Regularization { c } => vec![*c],
            HyperparameterSpace::Polynomial { c, degree } => vec![*c, *degree],
        }
    }

    /// Uniform random point
    pub fn sample(&self, rng: &mut impl Rng) -> Point {
        match self {
            HyperparameterSpace::Regularization { c } => Point { c: c.sample(rng), degree: None },
            HyperparameterSpace::Polynomial { c, degree } => Point {
                c: c.sample(rng),
                degree: Some(degree.sample(rng)),
            },
        }
    }

    /// Map a point into the unit hypercube used by the surrogate
    pub fn to_unit(&self, point: &Point) -> Vec<f64> {
        match self {
            HyperparameterSpace::Regularization { c } => vec![c.to_unit(point.c)],
            HyperparameterSpace::Polynomial { c, degree } => vec![
                c.to_unit(point.c),
                degree.to_unit(point.degree.unwrap_or(degree.low)),
            ],
        }
    }

    /// Inverse of [`to_unit`](Self::to_unit); coordinates are clamped to `[0, 1]`
    pub fn from_unit(&self, unit: &[f64]) -> Point {
        let at = |i: usize| unit.get(i).copied().unwrap_or(0.0);
        match self {
            HyperparameterSpace::Regularization { c } => Point { c: c.from_unit(at(0)), degree: None },
            HyperparameterSpace::Polynomial { c, degree } => Point {
                c: c.from_unit(at(0)),
                degree: Some(degree.from_unit(at(1))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn c_bounds() -> Bounds {
        Bounds::new("c", -2.0, 2.0).unwrap()
    }

    #[test]
    fn test_bounds_validation() {
        assert!(Bounds::new("c", 1.0, 1.0).is_err());
        assert!(Bounds::new("c", 2.0, 1.0).is_err());
        assert!(Bounds::new("c", f64::NEG_INFINITY, 1.0).is_err());
        assert!(Bounds::new("c", -1.0, 1.0).is_ok());
    }

    #[test]
    fn test_overflowing_width_rejected() {
        let err = Bounds::new("c", -1e308, 1e308).unwrap_err();
        assert!(matches!(err, SvrError::InvalidRequest(_)));
        assert!(Bounds::new("c", -1e307, 1e307).is_ok());
    }

    #[test]
    fn test_dimension_follows_kernel() {
        let degree = Bounds::new("degree", 2.0, 5.0).unwrap();
        let rbf = HyperparameterSpace::for_kernel(Kernel::Rbf, c_bounds(), Some(degree)).unwrap();
        assert_eq!(rbf.dim(), 1);
        assert_eq!(rbf.names(), &["c"]);

        let poly = HyperparameterSpace::for_kernel(Kernel::Poly, c_bounds(), Some(degree)).unwrap();
        assert_eq!(poly.dim(), 2);
        assert_eq!(poly.names(), &["c", "degree"]);
    }

    #[test]
    fn test_poly_without_degree_rejected() {
        let err = HyperparameterSpace::for_kernel(Kernel::Poly, c_bounds(), None).unwrap_err();
        assert!(matches!(err, SvrError::InvalidRequest(_)));
    }

    #[test]
    fn test_sampling_within_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let space = HyperparameterSpace::Polynomial {
            c: c_bounds(),
            degree: Bounds::new("degree", 2.0, 4.0).unwrap(),
        };
        for _ in 0..100 {
            let p = space.sample(&mut rng);
            assert!(p.c >= -2.0 && p.c <= 2.0);
            let d = p.degree.unwrap();
            assert!(d >= 2.0 && d <= 4.0);
        }
    }

    #[test]
    fn test_unit_mapping() {
        let space = HyperparameterSpace::Regularization { c: c_bounds() };
        let p = Point { c: 1.0, degree: None };
        let unit = space.to_unit(&p);
        assert!((unit[0] - 0.75).abs() < 1e-12);
        assert_eq!(space.from_unit(&unit), p);
        assert_eq!(space.from_unit(&[1.5]).c, 2.0);
    }

    #[test]
    fn test_point_serialization_omits_absent_degree() {
        let json = serde_json::to_string(&Point { c: 0.5, degree: None }).unwrap();
        assert_eq!(json, r#"{"c":0.5}"#);
    }
}
