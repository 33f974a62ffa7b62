use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about = "Train the 6hr / 12hr LSTM models from a pond CSV export")]
pub struct Args {
    #[arg(long, default_value = "pondsEdited.csv")]
    pub file: PathBuf,

    /// Where scalers.json and lstm_<interval>.json are written
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    #[arg(long, default_value_t = 50)]
    pub epochs: usize,

    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 0.001)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Retrain even if a model file already exists
    #[arg(long)]
    pub force: bool,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
