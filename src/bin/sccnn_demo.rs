//! SCCNN Demo: Whole-Complex Regression on Lifted Point Clouds
//!
//! ## Protocol
//!
//! 1. Sample point clouds made of 1 to 3 Gaussian blobs
//! 2. Lift each cloud to its Vietoris-Rips 2-skeleton at scale ε
//! 3. Signals: point coordinates on nodes, edge lengths on edges, a constant
//!    on triangles
//! 4. Target: number of connected components of the lift
//! 5. Train a two-layer joint (SCCNN) model with finite-difference SGD
//!
//! Usage: `sccnn_demo [model_config.json]`. Without an argument the built-in
//! configuration is used. Set `RUST_LOG=debug` for per-layer detail.

use std::error::Error;

use ndarray::{array, Array1, Array2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use topo_conv::training::mse;
use topo_conv::{
    train_step, train_test_split, CellComplex, ComputeContext, LayerConfig, Model, ModelConfig,
    Pooling, RankTable, Sample, Signals, TrainConfig, Update, VietorisRips,
};

const N_CLOUDS: usize = 24;
const POINTS_PER_BLOB: usize = 5;
const EPSILON: f64 = 0.6;

/// Gaussian blobs with centres far enough apart to stay disconnected at ε
fn sample_cloud(n_blobs: usize, rng: &mut impl Rng) -> Result<Array2<f64>, Box<dyn Error>> {
    let jitter = Normal::new(0.0, 0.15)?;
    let mut points = Array2::zeros((n_blobs * POINTS_PER_BLOB, 2));
    for b in 0..n_blobs {
        let centre = array![3.0 * b as f64, rng.random_range(-1.0..1.0)];
        for p in 0..POINTS_PER_BLOB {
            let mut row = points.row_mut(b * POINTS_PER_BLOB + p);
            row[0] = centre[0] + jitter.sample(rng);
            row[1] = centre[1] + jitter.sample(rng);
        }
    }
    Ok(points)
}

fn signals_for(points: &Array2<f64>, complex: &CellComplex) -> Signals {
    let lengths: Array1<f64> = complex
        .edges()
        .iter()
        .map(|&(u, v)| {
            let d = &points.row(u) - &points.row(v);
            d.dot(&d).sqrt()
        })
        .collect();

    let mut signals = Signals::new();
    signals.insert(0, points.clone());
    signals.insert(1, lengths.insert_axis(Axis(1)));
    signals.insert(2, Array2::ones((complex.n_faces(), 1)));
    signals
}

fn default_config() -> Result<ModelConfig, Box<dyn Error>> {
    let hidden = [4, 4, 4];
    let config = ModelConfig::repeated(
        2,
        |first| {
            let input: &[usize] = if first { &[2, 1, 1] } else { &hidden };
            Ok(LayerConfig::sccnn(input, &hidden, 1, 2)?
                .with_update(Update::Relu)
                .with_aggr_norm(true))
        },
        RankTable::from_iter([(0, 1), (1, 1), (2, 1)]),
    )?
    .with_pooling(Pooling::Mean);
    Ok(config)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sccnn_demo=info,topo_conv=info".into()),
        )
        .init();

    println!("═══════════════════════════════════════════════════════════════");
    println!("  SCCNN: Counting Components of Lifted Point Clouds");
    println!("═══════════════════════════════════════════════════════════════\n");

    let train = TrainConfig {
        epochs: 15,
        learning_rate: 0.01,
        ..TrainConfig::default()
    };
    let mut ctx = ComputeContext::new(train.seed);

    let config = match std::env::args().nth(1) {
        Some(path) => ModelConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => default_config()?,
    };

    // Dataset
    let mut data: Vec<(Sample, f64)> = Vec::with_capacity(N_CLOUDS);
    for i in 0..N_CLOUDS {
        let n_blobs = 1 + i % 3;
        let points = sample_cloud(n_blobs, ctx.rng())?;
        let vr = VietorisRips::from_points(&points, EPSILON)?;
        let complex = vr.lift()?;
        let target = vr.count_components() as f64;
        let sample = Sample {
            signals: signals_for(&points, &complex),
            operators: complex.operator_set()?,
        };
        data.push((sample, target));
    }
    let (train_set, test_set) = train_test_split(&data, train.test_fraction, ctx.rng())?;
    info!(train = train_set.len(), test = test_set.len(), epsilon = EPSILON, "dataset ready");
    let (train_samples, train_targets): (Vec<Sample>, Vec<f64>) = train_set.into_iter().unzip();
    let (test_samples, test_targets): (Vec<Sample>, Vec<f64>) = test_set.into_iter().unzip();

    let mut model = Model::new(config, &mut ctx)?;

    let loss = |m: &Model, samples: &[Sample], targets: &[f64]| -> topo_conv::Result<f64> {
        let mut total = 0.0;
        for (pred, &target) in m.forward_batch(samples).into_iter().zip(targets) {
            total += mse(pred?.flatten().view(), array![target].view())?;
        }
        Ok(total / samples.len().max(1) as f64)
    };

    let optimizer = train.optimizer();
    println!("Epoch   Train MSE    Test MSE");
    println!("─────   ─────────    ────────");
    for epoch in 0..train.epochs {
        let train_loss = train_step(
            &mut model,
            |m| loss(m, &train_samples, &train_targets),
            &optimizer,
            train.fd_step,
        )?;
        let test_loss = loss(&model, &test_samples, &test_targets)?;
        info!(epoch, train_loss, test_loss, "epoch");
        println!("{:>5}   {:>9.4}    {:>8.4}", epoch + 1, train_loss, test_loss);
    }

    println!("\nPredictions on held-out clouds:");
    for (sample, target) in test_samples.iter().zip(&test_targets) {
        let y = model.forward(&sample.signals, &sample.operators)?.flatten();
        println!("  components = {target:.0}   predicted = {:.3}", y[0]);
    }

    Ok(())
}
