use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::NetworkDepth;
use crate::data::matrix::FeatureMatrix;
use crate::data::split::partition_indices;
use crate::error::DevNetError;
use crate::models::base_model::Scorer;
use crate::models::checkpoint::load_checkpoint;
use crate::models::network::DeviationNetwork;
use crate::models::optimizer::RmsProp;
use crate::sampler::PairwiseBatchSampler;
use crate::train::Trainer;

fn to_py_err(e: DevNetError) -> PyErr {
    match e {
        DevNetError::Io(_) => PyIOError::new_err(e.to_string()),
        DevNetError::Csv(_) | DevNetError::Serde(_) => PyRuntimeError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

/// Python-exposed deviation network trainer
#[pyclass]
pub struct DevNet {
    depth: NetworkDepth,
    batch_size: usize,
    nb_batch: usize,
    epochs: usize,
    learning_rate: f64,
    weight_decay: f64,
    random_state: u64,
    network: Option<DeviationNetwork>,
    #[pyo3(get)]
    epoch_losses: Vec<f64>,
}

#[pymethods]
impl DevNet {
    #[new]
    #[pyo3(signature = (network_depth=2, batch_size=512, nb_batch=20, epochs=50, learning_rate=0.001, weight_decay=0.01, random_state=42))]
    fn new(
        network_depth: usize,
        batch_size: usize,
        nb_batch: usize,
        epochs: usize,
        learning_rate: f64,
        weight_decay: f64,
        random_state: u64,
    ) -> PyResult<Self> {
        let depth = NetworkDepth::try_from(network_depth).map_err(to_py_err)?;
        Ok(DevNet {
            depth,
            batch_size,
            nb_batch,
            epochs,
            learning_rate,
            weight_decay,
            random_state,
            network: None,
            epoch_losses: Vec::new(),
        })
    }

    /// Train on `x` with labels `y` (1 = known outlier). The best epoch is
    /// kept at `checkpoint_path` and loaded back. Returns the best loss.
    fn fit(
        &mut self,
        x: PyReadonlyArray2<f64>,
        y: PyReadonlyArray1<f64>,
        checkpoint_path: String,
    ) -> PyResult<f64> {
        let x = FeatureMatrix::Dense(x.as_array().to_owned());
        let labels: Vec<u8> = y.as_array().iter().map(|&v| u8::from(v == 1.0)).collect();
        if labels.len() != x.nrows() {
            return Err(PyValueError::new_err(format!(
                "x has {} rows but y has {} labels",
                x.nrows(),
                labels.len()
            )));
        }
        let (outliers, inliers) = partition_indices(&labels);

        let mut rng = StdRng::seed_from_u64(self.random_state);
        let mut network = DeviationNetwork::new(x.ncols(), self.depth, &mut rng);
        let mut trainer = Trainer::new(
            self.epochs,
            self.nb_batch,
            RmsProp::new(self.learning_rate, self.weight_decay),
            rng.gen(),
        );
        let mut sampler = PairwiseBatchSampler::new(
            &x,
            &outliers,
            &inliers,
            self.batch_size,
            self.nb_batch,
            &mut rng,
        )
        .map_err(to_py_err)?;
        let path = std::path::Path::new(&checkpoint_path);
        let report = trainer
            .fit(&mut network, &mut sampler, path)
            .map_err(to_py_err)?;
        self.network = Some(load_checkpoint(path, self.depth, x.ncols()).map_err(to_py_err)?);
        self.epoch_losses = report.epoch_losses;
        Ok(report.best_loss)
    }

    /// Anomaly score of every row of `x`.
    fn score<'py>(&self, py: Python<'py>, x: PyReadonlyArray2<f64>) -> PyResult<&'py PyArray1<f64>> {
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("call fit before score"))?;
        let x = x.as_array();
        if x.ncols() != network.input_dim() {
            return Err(PyValueError::new_err(format!(
                "expected {} features, got {}",
                network.input_dim(),
                x.ncols()
            )));
        }
        Ok(network.score_block(x).into_pyarray(py))
    }
}

/// Synthesize `n_out` contaminated rows from the outlier rows of `outliers`.
#[pyfunction]
#[pyo3(signature = (outliers, n_out, random_state=42))]
fn inject_noise<'py>(
    py: Python<'py>,
    outliers: PyReadonlyArray2<f64>,
    n_out: usize,
    random_state: u64,
) -> PyResult<&'py PyArray2<f64>> {
    let seed = FeatureMatrix::Dense(outliers.as_array().to_owned());
    let noise = crate::noise::inject_noise(&seed, n_out, random_state).map_err(to_py_err)?;
    Ok(noise.to_dense().into_pyarray(py))
}

/// `(auc_roc, auc_pr)` of anomaly scores against 0/1 labels.
#[pyfunction]
fn auc_performance(scores: Vec<f64>, labels: Vec<u8>) -> PyResult<(f64, f64)> {
    let perf = crate::utils::evaluation::auc_performance(&scores, &labels).map_err(to_py_err)?;
    Ok((perf.auc_roc, perf.auc_pr))
}

/// A Python module implemented in Rust.
#[pymodule]
fn devnet_rust(_py: Python, m: &PyModule) -> PyResult<()> {
    // DevNet:
    m.add_class::<DevNet>()?;

    m.add_function(wrap_pyfunction!(inject_noise, m)?)?;
    m.add_function(wrap_pyfunction!(auc_performance, m)?)?;
    Ok(())
}
