//! Offline sequence-model training.
//!
//! Used only by the `pond-trainer` binary. Nothing in the relay server
//! reads the models or scalers written here.

pub mod dataset;
pub mod lstm;
pub mod optim;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::projection::Horizon;

use self::dataset::{Row, Sample};
use self::lstm::{ModelConfig, SequenceModel};
use self::optim::Adam;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 0.001,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub loss: f64,
    pub val_loss: Option<f64>,
}

/// Mean squared error over all samples and outputs, dropout off.
pub fn evaluate(model: &SequenceModel, samples: &[Sample]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut total = 0.0;
    let mut count = 0usize;
    for sample in samples {
        let output = model.predict(&sample.input);
        total += output
            .iter()
            .zip(&sample.target)
            .map(|(y, t)| (y - t) * (y - t))
            .sum::<f64>();
        count += output.len();
    }
    Some(total / count as f64)
}

/// Mini-batch training with shuffling, dropout and Adam.
///
/// `on_epoch` sees each epoch's mean training loss and validation loss.
pub fn fit(
    model: &mut SequenceModel,
    train: &[Sample],
    validation: &[Sample],
    options: &TrainOptions,
    mut on_epoch: impl FnMut(&EpochReport),
) -> Vec<EpochReport> {
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut adam = Adam::new(options.learning_rate);
    let mut order: Vec<usize> = (0..train.len()).collect();
    let batch_size = options.batch_size.max(1);
    let mut reports = Vec::with_capacity(options.epochs);

    for epoch in 1..=options.epochs {
        order.shuffle(&mut rng);

        let mut epoch_loss = 0.0;
        let mut batches = 0usize;
        for batch in order.chunks(batch_size) {
            let outputs = model.config.output_size;
            let scale = 1.0 / (batch.len() * outputs) as f64;
            let mut grads = model.zero_gradients();
            let mut sse = 0.0;
            for &idx in batch {
                let sample = &train[idx];
                sse += model.accumulate(&sample.input, &sample.target, scale, &mut grads, Some(&mut rng));
            }
            adam.step(model.tensors_mut(), grads.tensors());
            epoch_loss += sse * scale;
            batches += 1;
        }

        let report = EpochReport {
            epoch,
            loss: if batches == 0 { 0.0 } else { epoch_loss / batches as f64 },
            val_loss: evaluate(model, validation),
        };
        on_epoch(&report);
        reports.push(report);
    }

    reports
}

pub fn model_path(dir: &Path, horizon: Horizon) -> PathBuf {
    dir.join(format!("lstm_{}.json", horizon))
}

#[derive(Debug)]
pub enum Outcome {
    Trained(Vec<EpochReport>),
    /// a model file was already present
    Skipped,
}

/// Trains and saves the model for one horizon unless `path` already exists
/// (and `force` is off).
pub fn train_if_missing(
    horizon: Horizon,
    rows: &[Row],
    config: ModelConfig,
    options: &TrainOptions,
    path: &Path,
    force: bool,
) -> anyhow::Result<Outcome> {
    if path.exists() && !force {
        tracing::info!("[TRAIN] Skipping {} model training. {} already exists.", horizon, path.display());
        return Ok(Outcome::Skipped);
    }

    let steps = horizon.window_steps();
    let samples = dataset::make_windows(rows, steps);
    if samples.is_empty() {
        bail!("need more than {} rows for {} windows, have {}", steps, horizon, rows.len());
    }
    let (train, validation) = dataset::split(samples);
    tracing::info!(
        train = train.len(),
        validation = validation.len(),
        steps,
        "[TRAIN] Training {} prediction model...",
        horizon
    );

    let mut model = SequenceModel::new(config, &mut StdRng::seed_from_u64(options.seed));
    let reports = fit(&mut model, &train, &validation, options, |report| {
        tracing::info!(
            epoch = report.epoch,
            loss = report.loss,
            val_loss = ?report.val_loss,
            "[TRAIN] {}",
            horizon
        )
    });

    model
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!("[TRAIN] {} model saved to {}", horizon, path.display());
    Ok(Outcome::Trained(reports))
}
