//! Training loop.
//!
//! Each epoch pulls `nb_batch` batches from the sampler and applies one
//! optimizer step per batch. After every epoch the mean batch loss is compared
//! with the best seen so far, and the network is checkpointed when it improves.

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::ExperimentConfig;
use crate::error::{DevNetError, DevNetResult};
use crate::models::checkpoint::save_checkpoint;
use crate::models::loss::DeviationLoss;
use crate::models::network::DeviationNetwork;
use crate::models::optimizer::RmsProp;
use crate::sampler::Batch;

/// Loss history of one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub epoch_losses: Vec<f64>,
    pub best_loss: f64,
    /// Zero-based epoch whose weights are in the checkpoint
    pub best_epoch: usize,
    pub checkpoints_written: usize,
}

pub struct Trainer {
    epochs: usize,
    nb_batch: usize,
    loss: DeviationLoss,
    optimizer: RmsProp,
    /// Source of the loss reference samples
    rng: StdRng,
}

impl Trainer {
    pub fn new(epochs: usize, nb_batch: usize, optimizer: RmsProp, seed: u64) -> Self {
        Self {
            epochs,
            nb_batch,
            loss: DeviationLoss::default(),
            optimizer,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_config(config: &ExperimentConfig, seed: u64) -> Self {
        Self::new(
            config.epochs,
            config.nb_batch,
            RmsProp::new(config.learning_rate, config.weight_decay),
            seed,
        )
    }

    pub fn with_loss(mut self, loss: DeviationLoss) -> Self {
        self.loss = loss;
        self
    }

    /// Forward, loss, backward and one optimizer update. Returns the batch loss.
    pub fn train_step(&mut self, network: &mut DeviationNetwork, batch: &Batch) -> f64 {
        let pass = network.forward(batch.features.view());
        let (loss, grad_scores) = self
            .loss
            .evaluate(&pass.scores(), &batch.labels, &mut self.rng);
        let grads = network.backward(&pass, &grad_scores);
        self.optimizer.step(network, &grads);
        loss
    }

    /// Train for the configured number of epochs, writing the network to
    /// `checkpoint` whenever an epoch's loss beats every earlier one.
    pub fn fit<I>(
        &mut self,
        network: &mut DeviationNetwork,
        batches: &mut I,
        checkpoint: &Path,
    ) -> DevNetResult<TrainingReport>
    where
        I: Iterator<Item = Batch>,
    {
        if self.epochs == 0 || self.nb_batch == 0 {
            return Err(DevNetError::configuration(
                "training needs at least one epoch of at least one batch",
            ));
        }
        let mut report = TrainingReport {
            epoch_losses: Vec::with_capacity(self.epochs),
            best_loss: f64::INFINITY,
            best_epoch: 0,
            checkpoints_written: 0,
        };

        for epoch in 0..self.epochs {
            let mut total = 0.0;
            for _ in 0..self.nb_batch {
                let batch = batches.next().ok_or_else(|| {
                    DevNetError::insufficient_data("batch sequence ended during training")
                })?;
                total += self.train_step(network, &batch);
            }
            let epoch_loss = total / self.nb_batch as f64;
            report.epoch_losses.push(epoch_loss);
            debug!("epoch {}/{} loss {:.6}", epoch + 1, self.epochs, epoch_loss);

            if epoch_loss < report.best_loss {
                debug!(
                    "loss improved from {:.6} to {:.6}, saving {}",
                    report.best_loss,
                    epoch_loss,
                    checkpoint.display()
                );
                report.best_loss = epoch_loss;
                report.best_epoch = epoch;
                save_checkpoint(checkpoint, network)?;
                report.checkpoints_written += 1;
            }
        }

        info!(
            "trained {} epochs, best loss {:.6} at epoch {}",
            self.epochs,
            report.best_loss,
            report.best_epoch + 1
        );
        Ok(report)
    }
}
