//! Experiment harness.
//!
//! For every configured dataset the harness repeats `runs` times: split,
//! drop labeled outliers beyond the known-outlier budget, contaminate the
//! training set with noise rows, train, then score the held-out rows with the
//! best checkpoint. AUC-ROC and AUC-PR are averaged over runs and appended to
//! the results table.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::ExperimentConfig;
use crate::data::loader::{load_dataset, Dataset};
use crate::data::matrix::FeatureMatrix;
use crate::data::split::{partition_indices, stratified_split};
use crate::error::{DevNetError, DevNetResult};
use crate::models::base_model::Scorer;
use crate::models::checkpoint::load_checkpoint;
use crate::models::network::DeviationNetwork;
use crate::noise::inject_noise;
use crate::sampler::PairwiseBatchSampler;
use crate::train::{Trainer, TrainingReport};
use crate::utils::evaluation::{auc_performance, AucPerformance};
use crate::utils::results::{append_result, ResultRecord};
use crate::utils::summary::RunningStatistic;

/// Noise rows needed so that they make up `cont_rate` of the contaminated
/// inliers: `n_inliers * cont_rate / (1 - cont_rate)`, rounded down.
pub fn noise_count(n_inliers: usize, cont_rate: f64) -> usize {
    let exact = n_inliers as f64 * cont_rate / (1.0 - cont_rate);
    // absorb representation error such as 15.999999999999998
    (exact + 1e-9).floor() as usize
}

/// Training partition after outlier removal and contamination.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub x: FeatureMatrix,
    pub labels: Vec<u8>,
    /// Labeled outliers dropped to respect the budget
    pub n_removed: usize,
    /// Noise rows appended with label 0
    pub n_noise: usize,
}

impl TrainingSet {
    pub fn n_outliers(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }
}

/// Drop labeled outliers beyond `known_outliers`, chosen uniformly at random
/// with `rng`, then append `noise_count` rows synthesized from `noise_source`.
pub fn contaminate(
    x_train: FeatureMatrix,
    y_train: Vec<u8>,
    noise_source: &FeatureMatrix,
    config: &ExperimentConfig,
    rng: &mut StdRng,
) -> DevNetResult<TrainingSet> {
    let (outlier_indices, inlier_indices) = partition_indices(&y_train);
    let n_noise = noise_count(inlier_indices.len(), config.cont_rate);

    let (mut x, mut labels, n_removed) = if outlier_indices.len() > config.known_outliers {
        let excess = outlier_indices.len() - config.known_outliers;
        let remove: Vec<usize> = index::sample(rng, outlier_indices.len(), excess)
            .into_iter()
            .map(|k| outlier_indices[k])
            .collect();
        let x = x_train.remove_rows(&remove);
        let mut dropped = vec![false; y_train.len()];
        for &r in &remove {
            dropped[r] = true;
        }
        let labels: Vec<u8> = y_train
            .iter()
            .enumerate()
            .filter(|(i, _)| !dropped[*i])
            .map(|(_, &l)| l)
            .collect();
        (x, labels, excess)
    } else {
        (x_train, y_train, 0)
    };

    let noise = inject_noise(noise_source, n_noise, config.seed)?;
    x = x.vstack(&noise)?;
    labels.extend(std::iter::repeat(0).take(noise.nrows()));
    debug_assert_eq!(labels.len(), x.nrows());

    Ok(TrainingSet {
        x,
        labels,
        n_removed,
        n_noise,
    })
}

/// Result of one train/evaluate cycle.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub performance: AucPerformance,
    pub training: TrainingReport,
    pub n_samples_trn: usize,
    pub n_outliers: usize,
    pub n_noise: usize,
    pub train_time: f64,
    pub test_time: f64,
}

/// One split, contaminate, train and evaluate cycle on `dataset`.
pub fn run_once(
    dataset: &Dataset,
    name: &str,
    config: &ExperimentConfig,
    run: usize,
) -> DevNetResult<RunOutcome> {
    let split = stratified_split(&dataset.labels, config.test_size, config.seed)?;
    debug_assert_eq!(split.train.len() + split.test.len(), dataset.labels.len());

    let x_train = dataset.x.select_rows(&split.train);
    let y_train: Vec<u8> = split.train.iter().map(|&i| dataset.labels[i]).collect();
    let x_test = dataset.x.select_rows(&split.test);
    let y_test: Vec<u8> = split.test.iter().map(|&i| dataset.labels[i]).collect();
    info!(
        "{}: round {}, original training size: {}, no. outliers: {}",
        name,
        run,
        x_train.nrows(),
        y_train.iter().filter(|&&l| l == 1).count()
    );

    let (all_outliers, _) = partition_indices(&dataset.labels);
    let noise_source = dataset.x.select_rows(&all_outliers);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let training = contaminate(x_train, y_train, &noise_source, config, &mut rng)?;
    let (outlier_indices, inlier_indices) = partition_indices(&training.labels);
    info!(
        "training data size: {}, no. outliers: {}, removed: {}, noise: {}",
        training.x.nrows(),
        outlier_indices.len(),
        training.n_removed,
        training.n_noise
    );

    let start = Instant::now();
    let mut run_rng = StdRng::seed_from_u64(config.seed.wrapping_add(run as u64));
    let mut network = DeviationNetwork::new(training.x.ncols(), config.network_depth, &mut run_rng);
    debug!("network summary:\n{}", network.summary());
    let mut trainer = Trainer::from_config(config, run_rng.gen());
    let mut sampler = PairwiseBatchSampler::new(
        &training.x,
        &outlier_indices,
        &inlier_indices,
        config.batch_size,
        config.nb_batch,
        &mut rng,
    )?;
    let checkpoint = config.checkpoint_path(name);
    let report = trainer.fit(&mut network, &mut sampler, &checkpoint)?;
    let train_time = start.elapsed().as_secs_f64();

    let start = Instant::now();
    let best = load_checkpoint(&checkpoint, config.network_depth, x_test.ncols())?;
    let scores = best.score_matrix(&x_test);
    let test_time = start.elapsed().as_secs_f64();
    let performance = auc_performance(&scores.to_vec(), &y_test)?;
    info!(
        "{}: round {} AUC-ROC: {:.4}, AUC-PR: {:.4}",
        name, run, performance.auc_roc, performance.auc_pr
    );

    Ok(RunOutcome {
        performance,
        training: report,
        n_samples_trn: training.x.nrows(),
        n_outliers: outlier_indices.len(),
        n_noise: training.n_noise,
        train_time,
        test_time,
    })
}

/// Repeat [`run_once`] `config.runs` times and aggregate the metrics.
pub fn run_dataset(
    dataset: &Dataset,
    name: &str,
    config: &ExperimentConfig,
) -> DevNetResult<ResultRecord> {
    let mut rauc = RunningStatistic::new();
    let mut ap = RunningStatistic::new();
    let mut train_time = RunningStatistic::new();
    let mut test_time = RunningStatistic::new();
    let mut last = None;

    for run in 0..config.runs {
        let outcome = run_once(dataset, name, config, run)?;
        rauc.update(outcome.performance.auc_roc);
        ap.update(outcome.performance.auc_pr);
        train_time.update(outcome.train_time);
        test_time.update(outcome.test_time);
        last = Some(outcome);
    }
    let last = last.ok_or_else(|| DevNetError::configuration("runs must be positive"))?;

    info!(
        "average AUC-ROC: {:.4}, average AUC-PR: {:.4}",
        rauc.mean(),
        ap.mean()
    );
    info!(
        "average runtime: {:.4} seconds",
        train_time.mean() + test_time.mean()
    );

    Ok(ResultRecord {
        name: format!("{}_{}", name, config.network_depth),
        n_samples: dataset.x.nrows(),
        dim: dataset.x.ncols(),
        n_samples_trn: last.n_samples_trn,
        n_outliers_org: dataset.n_outliers(),
        n_outliers: last.n_outliers,
        depth: config.network_depth.as_usize(),
        rauc: rauc.mean(),
        ap: ap.mean(),
        std_auc: rauc.std(),
        std_ap: ap.std(),
        train_time: train_time.mean(),
        test_time: test_time.mean(),
    })
}

/// Run every configured dataset and append one row per dataset to the
/// results table.
pub fn run_experiment(config: &ExperimentConfig) -> DevNetResult<Vec<ResultRecord>> {
    config.validate()?;
    let mut records = Vec::new();
    for name in config.dataset_names() {
        let path = config.dataset_path(&name);
        info!("loading {}", path.display());
        let dataset = load_dataset(&path, config.data_format)?;
        if dataset.x.format() != config.data_format {
            return Err(DevNetError::configuration(format!(
                "{} loaded as {:?}, expected {:?}",
                path.display(),
                dataset.x.format(),
                config.data_format
            )));
        }
        let record = run_dataset(&dataset, &name, config)?;
        append_result(&config.output, &record)?;
        records.push(record);
    }
    Ok(records)
}
