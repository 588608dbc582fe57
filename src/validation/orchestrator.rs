//! Validation orchestrator: tunes, fits and scores under the requested regime

use crate::error::{SvrError, Result};
use crate::optimizer::{BayesianTuner, HyperparameterSpace, Point, TunerConfig, TuningOutcome};
use crate::training::{CrossValidator, Kernel, SolverConfig, SupportVectorRegressor, SvrParams};
use ndarray::{ArrayView1, ArrayView2};
use std::time::Instant;
use tracing::{debug, info};

use super::request::{TrainingRequest, ValidationMode, N_FOLDS, VALIDATION_FRACTION};
use super::results::{
    ErrorMeasure, ErrorValue, FoldResult, HyperparameterRecord, HyperparameterSet, TrainedArtifact,
    TrainingOutput, TrialHistory,
};

/// Runs one [`TrainingRequest`] end to end.
///
/// The tuner maximizes the negated training error of each candidate. After
/// tuning, a model is refitted at the best point (degree rounded) and scored
/// on held-out rows where the mode has any. In k-fold mode this costs five
/// full tuning passes.
#[derive(Debug, Clone, Default)]
pub struct ValidationOrchestrator {
    tuner_config: TunerConfig,
    solver_config: SolverConfig,
}

impl ValidationOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tuner_config(mut self, config: TunerConfig) -> Self {
        self.tuner_config = config;
        self
    }

    pub fn with_solver_config(mut self, config: SolverConfig) -> Self {
        self.solver_config = config;
        self
    }

    pub fn solver_config(&self) -> &SolverConfig {
        &self.solver_config
    }

    /// Validate the request, then run the selected mode
    pub fn run(
        &self,
        request: &TrainingRequest,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<TrainingOutput> {
        request.validate()?;
        let space = request.search_space()?;

        if x.nrows() != y.len() {
            return Err(SvrError::InvalidRequest(format!(
                "feature matrix has {} rows but target has {}",
                x.nrows(),
                y.len()
            )));
        }
        if x.ncols() == 0 {
            return Err(SvrError::InvalidRequest("no feature columns".to_string()));
        }
        let min_rows = request.mode.min_rows();
        if x.nrows() < min_rows {
            return Err(SvrError::InvalidRequest(format!(
                "mode '{}' needs at least {} rows, got {}",
                request.mode,
                min_rows,
                x.nrows()
            )));
        }

        info!(
            mode = %request.mode,
            kernel = %request.kernel,
            criterion = %request.criterion,
            rows = x.nrows(),
            features = x.ncols(),
            evaluations = request.budget() * request.mode.tuning_passes(),
            "Starting training run"
        );
        let start = Instant::now();

        let output = match request.mode {
            ValidationMode::FullTrain => self.full_train(request, &space, x, y)?,
            ValidationMode::Split => self.split(request, &space, x, y)?,
            ValidationMode::KFold => self.k_fold(request, &space, x, y)?,
        };

        info!(
            mode = %request.mode,
            trials = output.history.total_trials(),
            error = ?output.error_measure.as_ref().map(|m| m.mean()),
            duration_secs = start.elapsed().as_secs_f64(),
            "Training run finished"
        );
        Ok(output)
    }

    fn full_train(
        &self,
        request: &TrainingRequest,
        space: &HyperparameterSpace,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<TrainingOutput> {
        let outcome = self.tune(request, space, x, y)?;
        let model = self.fit_at(request.kernel, &outcome.best.hyperparameters, x, y)?;

        Ok(TrainingOutput {
            mode: ValidationMode::FullTrain,
            hyperparameters: HyperparameterSet::Single(HyperparameterRecord::from(model.params())),
            artifact: TrainedArtifact::Single(model),
            error_measure: None,
            history: TrialHistory::Single(outcome.history),
        })
    }

    fn split(
        &self,
        request: &TrainingRequest,
        space: &HyperparameterSpace,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<TrainingOutput> {
        let split = CrossValidator::new(request.seed).train_test_split(x.nrows(), VALIDATION_FRACTION)?;
        let (x_train, x_valid, y_train, y_valid) = split.take(x, y);
        debug!(train = x_train.nrows(), valid = x_valid.nrows(), "Hold-out split");

        let outcome = self.tune(request, space, x_train.view(), y_train.view())?;
        let model = self.fit_at(request.kernel, &outcome.best.hyperparameters, x_train.view(), y_train.view())?;
        let y_valid_hat = model.predict(x_valid.view())?;
        let error = request.criterion.evaluate(y_valid_hat.view(), y_valid.view())?;

        Ok(TrainingOutput {
            mode: ValidationMode::Split,
            hyperparameters: HyperparameterSet::Single(HyperparameterRecord::from(model.params())),
            artifact: TrainedArtifact::Single(model),
            error_measure: Some(ErrorMeasure {
                criterion: request.criterion,
                value: ErrorValue::Scalar(error),
            }),
            history: TrialHistory::Single(outcome.history),
        })
    }

    fn k_fold(
        &self,
        request: &TrainingRequest,
        space: &HyperparameterSpace,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<TrainingOutput> {
        let splits = CrossValidator::new(request.seed).k_fold(x.nrows(), N_FOLDS)?;

        let mut folds = Vec::with_capacity(N_FOLDS);
        for split in &splits {
            let (x_train, x_valid, y_train, y_valid) = split.take(x, y);

            let outcome = self.tune(request, space, x_train.view(), y_train.view())?;
            let model =
                self.fit_at(request.kernel, &outcome.best.hyperparameters, x_train.view(), y_train.view())?;
            let y_valid_hat = model.predict(x_valid.view())?;
            let error = request.criterion.evaluate(y_valid_hat.view(), y_valid.view())?;

            info!(fold = split.fold_idx, error, best_score = outcome.best.score, "Fold finished");
            folds.push(FoldResult {
                fold: split.fold_idx,
                hyperparameters: HyperparameterRecord::from(model.params()),
                model,
                error,
                history: outcome.history,
            });
        }

        TrainingOutput::from_folds(request.criterion, folds)
    }

    /// One tuning pass whose objective is the negated training error
    fn tune(
        &self,
        request: &TrainingRequest,
        space: &HyperparameterSpace,
        x_train: ArrayView2<f64>,
        y_train: ArrayView1<f64>,
    ) -> Result<TuningOutcome> {
        let tuner = BayesianTuner::new(space.clone(), request.init_points, request.n_iter)
            .with_config(self.tuner_config.clone())
            .with_seed(request.seed);

        tuner.maximize(|point| {
            let model = self.fit_at(request.kernel, point, x_train, y_train)?;
            let y_hat = model.predict(x_train)?;
            Ok(-request.criterion.evaluate(y_hat.view(), y_train)?)
        })
    }

    /// Fit at a tuner point; the degree is rounded here
    fn fit_at(
        &self,
        kernel: Kernel,
        point: &Point,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
    ) -> Result<SupportVectorRegressor> {
        let params = SvrParams::from_log_c(point.c, kernel, point.degree);
        let mut model = SupportVectorRegressor::new(params, self.solver_config.clone());
        model.fit(x, y)?;
        Ok(model)
    }
}
