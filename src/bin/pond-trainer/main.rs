mod args;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{bail, Context as _, Result};
use args::Args;
use clap::Parser as _;

use pond_relay::projection::Horizon;
use pond_relay::telemetry;
use pond_relay::training::dataset::{self, FeatureScalers, FEATURES};
use pond_relay::training::lstm::ModelConfig;
use pond_relay::training::{model_path, train_if_missing, TrainOptions};

fn main() -> Result<()> {
    let args = Args::parse();
    telemetry::init(&args.log_level);

    let observations = dataset::load_csv(&args.file)
        .with_context(|| format!("failed to load {:?}", args.file))?;
    if observations.is_empty() {
        bail!("no complete rows in {:?}", args.file);
    }
    tracing::info!(rows = observations.len(), "[TRAIN] dataset loaded");

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {:?}", args.output_dir))?;

    let scalers = FeatureScalers::fit(&observations);
    let scalers_path = args.output_dir.join("scalers.json");
    save_json(&scalers_path, &scalers).context("failed to save scalers")?;
    tracing::info!("[TRAIN] scalers saved to {}", scalers_path.display());

    let rows = scalers.transform(&observations);
    let options = TrainOptions {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        seed: args.seed,
    };

    for horizon in Horizon::ALL {
        let path = model_path(&args.output_dir, horizon);
        train_if_missing(horizon, &rows, ModelConfig::new(FEATURES), &options, &path, args.force)
            .with_context(|| format!("failed to train {} model", horizon))?;
    }

    tracing::info!("[TRAIN] Training complete.");
    Ok(())
}

fn save_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}
