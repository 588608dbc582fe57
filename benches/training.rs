use bayes_svr::inference::InferenceEngine;
use bayes_svr::training::{Kernel, SolverConfig, SupportVectorRegressor, SvrParams};
use bayes_svr::validation::{TrainedArtifact, TrainingRequest, ValidationMode, ValidationOrchestrator};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    // Target as sum of features + noise
    let y = x.rows().into_iter().map(|row| row.sum() + rng.gen::<f64>() * 0.1).collect();
    (x, y)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [100, 500, 1000].iter() {
        let data = create_regression_data(*n_rows, 5);

        group.bench_with_input(BenchmarkId::new("rbf", n_rows), &data, |b, (x, y)| {
            b.iter(|| {
                let params = SvrParams::from_log_c(0.0, Kernel::Rbf, None);
                let mut model = SupportVectorRegressor::new(params, SolverConfig::default());
                model.fit(black_box(x.view()), black_box(y.view())).unwrap();
                model
            })
        });
    }

    group.finish();
}

fn bench_split_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_run");
    group.sample_size(10);

    let (x, y) = create_regression_data(100, 3);
    let orchestrator = ValidationOrchestrator::new();
    let request = TrainingRequest::new(ValidationMode::Split, Kernel::Rbf).with_seed(Some(42));

    group.bench_function("rbf_32_trials", |b| {
        b.iter(|| orchestrator.run(black_box(&request), x.view(), y.view()).unwrap())
    });

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train fold models once
    let (train_x, train_y) = create_regression_data(200, 5);
    let models = (0..5)
        .map(|i| {
            let params = SvrParams::from_log_c(i as f64 * 0.5, Kernel::Rbf, None);
            let mut model = SupportVectorRegressor::new(params, SolverConfig::default());
            model.fit(train_x.view(), train_y.view()).unwrap();
            model
        })
        .collect();
    let artifact = TrainedArtifact::ensemble(models).unwrap();
    let engine = InferenceEngine::default();

    for n_rows in [100, 1000, 10000].iter() {
        let (x, _) = create_regression_data(*n_rows, 5);

        group.bench_with_input(BenchmarkId::new("ensemble", n_rows), &x, |b, x| {
            b.iter(|| engine.predict(Some(&artifact), black_box(x.view())).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_split_run, bench_prediction);
criterion_main!(benches);
