//! Train/validation partitioning: shuffled k-fold and a single hold-out split

use crate::error::{SvrError, Result};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A single train/validation split
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

impl CVSplit {
    /// Materialize the split as owned `(x_train, x_valid, y_train, y_valid)`
    pub fn take(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> (Array2<f64>, Array2<f64>, Array1<f64>, Array1<f64>) {
        (
            x.select(Axis(0), &self.train_indices),
            x.select(Axis(0), &self.test_indices),
            y.select(Axis(0), &self.train_indices),
            y.select(Axis(0), &self.test_indices),
        )
    }
}

/// Seeded splitter shared by the k-fold and hold-out regimes
#[derive(Debug, Clone)]
pub struct CrossValidator {
    random_state: Option<u64>,
}

impl CrossValidator {
    pub fn new(random_state: Option<u64>) -> Self {
        Self { random_state }
    }

    fn shuffled_indices(&self, n_samples: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        indices.shuffle(&mut rng);
        indices
    }

    /// Shuffled k-fold: every sample lands in exactly one validation fold.
    /// The first `n_samples % n_splits` folds carry one extra sample.
    pub fn k_fold(&self, n_samples: usize, n_splits: usize) -> Result<Vec<CVSplit>> {
        if n_splits < 2 {
            return Err(SvrError::InvalidRequest("n_splits must be at least 2".to_string()));
        }
        if n_samples < n_splits {
            return Err(SvrError::InvalidRequest(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        let indices = self.shuffled_indices(n_samples);
        let base = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;

        for fold_idx in 0..n_splits {
            let fold_size = if fold_idx < remainder { base + 1 } else { base };
            let test_indices = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();

            splits.push(CVSplit { train_indices, test_indices, fold_idx });
            current += fold_size;
        }

        Ok(splits)
    }

    /// Shuffled hold-out split. The validation part gets `ceil(n * test_fraction)`
    /// samples, the training part the rest; both are non-empty.
    pub fn train_test_split(&self, n_samples: usize, test_fraction: f64) -> Result<CVSplit> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(SvrError::InvalidRequest(format!(
                "test fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }
        if n_samples < 2 {
            return Err(SvrError::InvalidRequest(format!(
                "a train/validation split needs at least 2 samples, got {}",
                n_samples
            )));
        }

        let n_test = ((n_samples as f64 * test_fraction).ceil() as usize).clamp(1, n_samples - 1);
        let n_train = n_samples - n_test;
        let indices = self.shuffled_indices(n_samples);

        Ok(CVSplit {
            train_indices: indices[..n_train].to_vec(),
            test_indices: indices[n_train..].to_vec(),
            fold_idx: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold() {
        let cv = CrossValidator::new(Some(42));
        let splits = cv.k_fold(100, 5).unwrap();

        assert_eq!(splits.len(), 5);
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
            for idx in &split.test_indices {
                assert!(!split.train_indices.contains(idx));
            }
        }

        // All indices should be covered exactly once in test sets
        let mut all_test: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        all_test.sort();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_k_fold_uneven() {
        let cv = CrossValidator::new(Some(7));
        let splits = cv.k_fold(7, 5).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1, 1, 1]);
    }

    #[test]
    fn test_k_fold_too_few_samples() {
        let cv = CrossValidator::new(None);
        assert!(cv.k_fold(4, 5).is_err());
    }

    #[test]
    fn test_seeded_splits_repeat() {
        let a = CrossValidator::new(Some(3)).k_fold(50, 5).unwrap();
        let b = CrossValidator::new(Some(3)).k_fold(50, 5).unwrap();
        for (sa, sb) in a.iter().zip(b.iter()) {
            assert_eq!(sa.test_indices, sb.test_indices);
        }
    }

    #[test]
    fn test_train_test_split_sizes() {
        let cv = CrossValidator::new(Some(42));
        let split = cv.train_test_split(100, 0.2).unwrap();
        assert_eq!(split.train_indices.len(), 80);
        assert_eq!(split.test_indices.len(), 20);

        let split = cv.train_test_split(11, 0.2).unwrap();
        assert_eq!(split.test_indices.len(), 3);
        assert_eq!(split.train_indices.len(), 8);
    }

    #[test]
    fn test_split_take() {
        let x = Array2::from_shape_fn((6, 2), |(r, c)| (r * 2 + c) as f64);
        let y = Array1::from_iter((0..6).map(|v| v as f64));
        let split = CrossValidator::new(Some(1)).train_test_split(6, 0.5).unwrap();
        let (x_train, x_valid, y_train, y_valid) = split.take(x.view(), y.view());
        assert_eq!(x_train.nrows(), 3);
        assert_eq!(x_valid.nrows(), 3);
        assert_eq!(y_train[0], x_train[[0, 0]] / 2.0);
        assert_eq!(y_valid.len(), 3);
    }
}
