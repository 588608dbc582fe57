//! Inference engine implementation
//!
//! Applies a [`TrainedArtifact`] to feature rows. A single model's output is
//! returned as is. An ensemble returns the row-wise mean of its fold models,
//! skipping undefined (non-finite) outputs instead of propagating them.

use crate::data::{feature_matrix, MissingValues};
use crate::error::{SvrError, Result};
use crate::training::SupportVectorRegressor;
use crate::validation::TrainedArtifact;
use super::InferenceConfig;
use ndarray::{Array1, ArrayView2, Axis};
use polars::prelude::*;
use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

/// Batch predictor over trained artifacts
#[derive(Debug, Clone, Default)]
pub struct InferenceEngine {
    config: InferenceConfig,
}

impl InferenceEngine {
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// One prediction per row of `x`
    pub fn predict(&self, artifact: Option<&TrainedArtifact>, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let artifact = artifact.ok_or(SvrError::NoTrainedModel)?;
        let start = Instant::now();

        let predictions = match artifact {
            TrainedArtifact::Single(model) => self.predict_model(model, x)?,
            TrainedArtifact::Ensemble(models) => {
                let outputs: Vec<Array1<f64>> = if self.config.parallel_ensemble {
                    models
                        .par_iter()
                        .map(|m| self.predict_model(m, x))
                        .collect::<Result<Vec<_>>>()?
                } else {
                    models
                        .iter()
                        .map(|m| self.predict_model(m, x))
                        .collect::<Result<Vec<_>>>()?
                };
                nan_mean(&outputs, x.nrows())
            }
        };

        debug!(
            rows = x.nrows(),
            models = artifact.models().len(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Prediction finished"
        );
        Ok(predictions)
    }

    /// Predict from a table and return a copy with `target` set to the
    /// predictions. Missing cells in feature columns become NaN.
    pub fn predict_frame(
        &self,
        artifact: Option<&TrainedArtifact>,
        df: &DataFrame,
        features: &[String],
        target: &str,
    ) -> Result<DataFrame> {
        let artifact = artifact.ok_or(SvrError::NoTrainedModel)?;
        let x = feature_matrix(df, features, MissingValues::AsNan)?;
        let predictions = self.predict(Some(artifact), x.view())?;

        let mut out = df.clone();
        out.with_column(Series::new(target.into(), predictions.to_vec()))?;
        Ok(out)
    }

    fn predict_model(&self, model: &SupportVectorRegressor, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if x.nrows() <= self.config.batch_size {
            return model.predict(x);
        }

        let batches: Vec<ArrayView2<f64>> = x.axis_chunks_iter(Axis(0), self.config.batch_size).collect();
        let results = batches
            .par_iter()
            .map(|batch| model.predict(batch.view()))
            .collect::<Result<Vec<_>>>()?;

        let mut all_predictions = Vec::with_capacity(x.nrows());
        for preds in results {
            all_predictions.extend(preds.iter().copied());
        }
        Ok(Array1::from_vec(all_predictions))
    }
}

/// Row-wise mean over finite values; NaN where no model produced one
fn nan_mean(outputs: &[Array1<f64>], n_rows: usize) -> Array1<f64> {
    Array1::from_shape_fn(n_rows, |row| {
        let (sum, count) = outputs
            .iter()
            .filter_map(|o| o.get(row).copied())
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{Kernel, SolverConfig, SvrParams};
    use ndarray::{array, Array2};

    fn fitted(offset: f64) -> SupportVectorRegressor {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64 / 5.0);
        let y = x.column(0).mapv(|v| v + offset);
        let mut model = SupportVectorRegressor::new(
            SvrParams::from_log_c(2.0, Kernel::Linear, None),
            SolverConfig::default(),
        );
        model.fit(x.view(), y.view()).unwrap();
        model
    }

    #[test]
    fn test_no_artifact() {
        let engine = InferenceEngine::default();
        let x = Array2::<f64>::zeros((2, 1));
        assert!(matches!(engine.predict(None, x.view()), Err(SvrError::NoTrainedModel)));
    }

    #[test]
    fn test_single_matches_model() {
        let model = fitted(0.0);
        let x = array![[0.5], [1.5], [3.0]];
        let expected = model.predict(x.view()).unwrap();
        let artifact = TrainedArtifact::Single(model);
        let got = InferenceEngine::default().predict(Some(&artifact), x.view()).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_batched_matches_unbatched() {
        let artifact = TrainedArtifact::Single(fitted(1.0));
        let x = Array2::from_shape_fn((25, 1), |(i, _)| i as f64 * 0.1);
        let whole = InferenceEngine::default().predict(Some(&artifact), x.view()).unwrap();
        let batched = InferenceEngine::new(InferenceConfig::new().with_batch_size(4))
            .predict(Some(&artifact), x.view())
            .unwrap();
        assert_eq!(whole, batched);
    }

    #[test]
    fn test_ensemble_is_mean_of_folds() {
        let models: Vec<_> = (0..5).map(|i| fitted(i as f64)).collect();
        let x = array![[1.0], [2.0]];
        let per_model: Vec<Array1<f64>> = models.iter().map(|m| m.predict(x.view()).unwrap()).collect();
        let artifact = TrainedArtifact::ensemble(models).unwrap();

        let got = InferenceEngine::default().predict(Some(&artifact), x.view()).unwrap();
        for row in 0..2 {
            let mean = per_model.iter().map(|p| p[row]).sum::<f64>() / 5.0;
            assert!((got[row] - mean).abs() < 1e-12);
        }
    }

    #[test]
    fn test_nan_mean_ignores_undefined() {
        let outputs = vec![array![1.0, f64::NAN], array![3.0, f64::NAN], array![f64::NAN, f64::NAN]];
        let mean = nan_mean(&outputs, 2);
        assert_eq!(mean[0], 2.0);
        assert!(mean[1].is_nan());
    }

    #[test]
    fn test_predict_frame() {
        let artifact = TrainedArtifact::Single(fitted(0.0));
        let df = df!("x" => &[1.0, 2.0], "y" => &[0.0, 0.0]).unwrap();
        let engine = InferenceEngine::default();

        let out = engine
            .predict_frame(Some(&artifact), &df, &["x".to_string()], "y")
            .unwrap();
        assert_eq!(out.width(), 2);
        let y = out.column("y").unwrap().f64().unwrap();
        assert!((y.get(1).unwrap() - 2.0).abs() < 0.5);

        let err = engine
            .predict_frame(Some(&artifact), &df, &["missing".to_string()], "y")
            .unwrap_err();
        assert!(matches!(err, SvrError::ColumnMissing(_)));

        // Target column is added when absent from the input
        let no_target = df!("x" => &[1.0]).unwrap();
        let out = engine.predict_frame(Some(&artifact), &no_target, &["x".to_string()], "y").unwrap();
        assert_eq!(out.get_column_names_str(), vec!["x", "y"]);
    }
}
