//! Weakly-supervised anomaly detection with deviation networks.
//!
//! A small feed-forward network is trained to score rows so that inliers land
//! near the mean of a reference normal distribution and the few labeled
//! outliers land several standard deviations above it. Training data is
//! contaminated with synthetic noise rows to mimic unlabeled anomalies.

pub mod config;
pub mod data;
pub mod error;
pub mod harness;
pub mod models;
pub mod noise;
pub mod sampler;
pub mod train;
pub mod utils;

#[cfg(feature = "python")]
mod python;

pub use config::{DataFormat, ExperimentConfig, NetworkDepth};
pub use data::{Dataset, FeatureMatrix};
pub use error::{DevNetError, DevNetResult};
pub use harness::{run_dataset, run_experiment, run_once};
pub use models::{DeviationLoss, DeviationNetwork, Scorer};
pub use noise::inject_noise;
pub use sampler::{Batch, PairwiseBatchSampler};
pub use train::{Trainer, TrainingReport};
pub use utils::{auc_performance, AucPerformance, ResultRecord};
