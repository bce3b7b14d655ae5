//! Deviation network experiment runner.
//!
//! Usage:
//!   devnet [OPTIONS]
//!
//! Examples:
//!   # Two-layer network on the default dataset, 10 runs
//!   devnet --input-path ./dataset/ --dataset annthyroid_21feat_normalised
//!
//!   # Sparse data, four-layer network
//!   devnet --data-format sparse --network-depth 4 --dataset news20
//!
//!   # Options from a JSON file, with one flag overriding it
//!   devnet --config experiment.json --runs 3

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use devnet_rust::{run_experiment, DataFormat, ExperimentConfig, NetworkDepth};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Dense,
    Sparse,
}

impl From<Format> for DataFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Dense => DataFormat::Dense,
            Format::Sparse => DataFormat::Sparse,
        }
    }
}

#[derive(Parser)]
#[command(name = "devnet")]
#[command(about = "Train and evaluate deviation networks on contaminated anomaly data")]
#[command(version)]
struct Args {
    /// JSON file with experiment options; flags below override it
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Network depth (1, 2 or 4)
    #[arg(long)]
    network_depth: Option<usize>,

    /// Batch size used in SGD
    #[arg(short = 'b', long)]
    batch_size: Option<usize>,

    /// Number of batches per epoch
    #[arg(long)]
    nb_batch: Option<usize>,

    /// Number of training epochs
    #[arg(short = 'e', long)]
    epochs: Option<usize>,

    /// How many times to repeat each experiment
    #[arg(short = 'r', long)]
    runs: Option<usize>,

    /// Number of labeled outliers available during training
    #[arg(long)]
    known_outliers: Option<usize>,

    /// Outlier contamination rate of the training inliers
    #[arg(long)]
    cont_rate: Option<f64>,

    /// Directory holding the dataset files
    #[arg(long)]
    input_path: Option<PathBuf>,

    /// Comma-separated list of dataset names
    #[arg(short = 'd', long)]
    dataset: Option<String>,

    /// On-disk layout of the datasets
    #[arg(long, value_enum)]
    data_format: Option<Format>,

    /// Results table (CSV, appended to)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Directory for best-loss checkpoints
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Random seed
    #[arg(long, alias = "ramdn-seed")]
    seed: Option<u64>,

    /// Held-out fraction of each dataset
    #[arg(long)]
    test_size: Option<f64>,

    /// RMSprop learning rate
    #[arg(short = 'l', long)]
    learning_rate: Option<f64>,

    /// RMSprop weight decay
    #[arg(long)]
    weight_decay: Option<f64>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => ExperimentConfig::default(),
        };

        if let Some(depth) = self.network_depth {
            config.network_depth = NetworkDepth::try_from(depth)?;
        }
        if let Some(v) = self.batch_size {
            config.batch_size = v;
        }
        if let Some(v) = self.nb_batch {
            config.nb_batch = v;
        }
        if let Some(v) = self.epochs {
            config.epochs = v;
        }
        if let Some(v) = self.runs {
            config.runs = v;
        }
        if let Some(v) = self.known_outliers {
            config.known_outliers = v;
        }
        if let Some(v) = self.cont_rate {
            config.cont_rate = v;
        }
        if let Some(v) = self.input_path {
            config.input_path = v;
        }
        if let Some(v) = self.dataset {
            config.dataset = v;
        }
        if let Some(v) = self.data_format {
            config.data_format = v.into();
        }
        if let Some(v) = self.output {
            config.output = v;
        }
        if let Some(v) = self.model_dir {
            config.model_dir = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.test_size {
            config.test_size = v;
        }
        if let Some(v) = self.learning_rate {
            config.learning_rate = v;
        }
        if let Some(v) = self.weight_decay {
            config.weight_decay = v;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = args.into_config()?;
    tracing::info!("=== DevNet ===");
    tracing::info!("Datasets: {}", config.dataset);
    tracing::info!(
        "Depth: {}, batch size: {}, batches/epoch: {}, epochs: {}, runs: {}",
        config.network_depth,
        config.batch_size,
        config.nb_batch,
        config.epochs,
        config.runs
    );
    tracing::info!(
        "Known outliers: {}, contamination rate: {}",
        config.known_outliers,
        config.cont_rate
    );

    let records = run_experiment(&config)?;
    for record in &records {
        tracing::info!(
            "{}: AUC-ROC {:.4} (+/- {:.4}), AUC-PR {:.4} (+/- {:.4})",
            record.name,
            record.rauc,
            record.std_auc,
            record.ap,
            record.std_ap
        );
    }
    tracing::info!("Results appended to {}", config.output.display());
    Ok(())
}
