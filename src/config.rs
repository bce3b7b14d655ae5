//! Experiment configuration.
//!
//! Every option the harness recognizes lives on [`ExperimentConfig`]. The
//! on-disk data format and the network depth are explicit enums and are passed
//! down to each component instead of being read from shared state.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DevNetError, DevNetResult};

/// Storage layout of a dataset and of the matrices derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Comma-separated values, held as a dense array
    Dense,
    /// LIBSVM records, held as a compressed sparse matrix
    Sparse,
}

impl DataFormat {
    /// File extension the loader expects for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Dense => "csv",
            DataFormat::Sparse => "svm",
        }
    }
}

/// Depth variant of the deviation scoring network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub enum NetworkDepth {
    /// input -> 1000 -> 250 -> 20 -> 1
    Four,
    /// input -> 20 -> 1
    Two,
    /// input -> 1
    One,
}

impl NetworkDepth {
    pub fn as_usize(&self) -> usize {
        match self {
            NetworkDepth::Four => 4,
            NetworkDepth::Two => 2,
            NetworkDepth::One => 1,
        }
    }

    /// Widths of the hidden layers, input and output excluded.
    pub fn hidden_widths(&self) -> &'static [usize] {
        match self {
            NetworkDepth::Four => &[1000, 250, 20],
            NetworkDepth::Two => &[20],
            NetworkDepth::One => &[],
        }
    }
}

impl TryFrom<usize> for NetworkDepth {
    type Error = DevNetError;

    fn try_from(depth: usize) -> DevNetResult<Self> {
        match depth {
            4 => Ok(NetworkDepth::Four),
            2 => Ok(NetworkDepth::Two),
            1 => Ok(NetworkDepth::One),
            other => Err(DevNetError::configuration(format!(
                "the network depth is not set properly: {} (expected 1, 2 or 4)",
                other
            ))),
        }
    }
}

impl From<NetworkDepth> for usize {
    fn from(depth: NetworkDepth) -> usize {
        depth.as_usize()
    }
}

impl fmt::Display for NetworkDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_usize())
    }
}

/// Options for a full experiment: which datasets, how to contaminate them and
/// how to train the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub network_depth: NetworkDepth,
    /// Samples per training batch
    pub batch_size: usize,
    /// Batches drawn per epoch
    pub nb_batch: usize,
    pub epochs: usize,
    /// How many times each experiment is repeated
    pub runs: usize,
    /// Maximum number of labeled outliers kept in training
    pub known_outliers: usize,
    /// Fraction of training inliers that should be synthetic noise
    pub cont_rate: f64,
    pub input_path: PathBuf,
    /// Comma-separated dataset names
    pub dataset: String,
    pub data_format: DataFormat,
    /// Results table
    pub output: PathBuf,
    /// Directory holding model checkpoints
    pub model_dir: PathBuf,
    pub seed: u64,
    /// Held-out fraction of each dataset
    pub test_size: f64,
    pub learning_rate: f64,
    pub weight_decay: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            network_depth: NetworkDepth::Two,
            batch_size: 512,
            nb_batch: 20,
            epochs: 50,
            runs: 10,
            known_outliers: 30,
            cont_rate: 0.02,
            input_path: PathBuf::from("./dataset/"),
            dataset: "annthyroid_21feat_normalised".to_string(),
            data_format: DataFormat::Dense,
            output: PathBuf::from(
                "./results/devnet_auc_performance_30outliers_0.02contrate_2depth_10runs.csv",
            ),
            model_dir: PathBuf::from("./model/"),
            seed: 42,
            test_size: 0.2,
            learning_rate: 0.001,
            weight_decay: 0.01,
        }
    }
}

impl ExperimentConfig {
    /// Load a configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> DevNetResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject option combinations no run could complete with.
    pub fn validate(&self) -> DevNetResult<()> {
        if self.batch_size == 0 {
            return Err(DevNetError::configuration("batch size must be positive"));
        }
        if self.nb_batch == 0 {
            return Err(DevNetError::configuration("nb_batch must be positive"));
        }
        if self.epochs == 0 {
            return Err(DevNetError::configuration("epochs must be positive"));
        }
        if self.runs == 0 {
            return Err(DevNetError::configuration("runs must be positive"));
        }
        if !(0.0..1.0).contains(&self.cont_rate) {
            return Err(DevNetError::configuration(format!(
                "contamination rate must lie in [0, 1), got {}",
                self.cont_rate
            )));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(DevNetError::configuration(format!(
                "test size must lie in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.learning_rate <= 0.0 {
            return Err(DevNetError::configuration("learning rate must be positive"));
        }
        if self.dataset_names().is_empty() {
            return Err(DevNetError::configuration("no dataset names given"));
        }
        Ok(())
    }

    pub fn dataset_names(&self) -> Vec<String> {
        self.dataset
            .split(',')
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Location of a dataset file, `<input_path>/<name>.<csv|svm>`.
    pub fn dataset_path(&self, name: &str) -> PathBuf {
        self.input_path
            .join(format!("{}.{}", name, self.data_format.extension()))
    }

    /// Location of the best-loss checkpoint for a dataset under this config.
    pub fn checkpoint_path(&self, name: &str) -> PathBuf {
        self.model_dir.join(format!(
            "devnet_{}_{}cr_{}bs_{}ko_{}d.json",
            name, self.cont_rate, self.batch_size, self.known_outliers, self.network_depth
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_parsing() {
        assert_eq!(NetworkDepth::try_from(4).unwrap(), NetworkDepth::Four);
        assert_eq!(NetworkDepth::try_from(2).unwrap(), NetworkDepth::Two);
        assert_eq!(NetworkDepth::try_from(1).unwrap(), NetworkDepth::One);
        assert!(matches!(
            NetworkDepth::try_from(3),
            Err(DevNetError::Configuration(_))
        ));
    }

    #[test]
    fn test_defaults_validate() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dataset_names(), vec!["annthyroid_21feat_normalised"]);
    }

    #[test]
    fn test_invalid_contamination_rate() {
        let config = ExperimentConfig {
            cont_rate: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DevNetError::Configuration(_))
        ));
    }

    #[test]
    fn test_paths() {
        let config = ExperimentConfig {
            input_path: PathBuf::from("data"),
            model_dir: PathBuf::from("model"),
            data_format: DataFormat::Sparse,
            ..Default::default()
        };
        assert_eq!(config.dataset_path("news"), PathBuf::from("data/news.svm"));
        assert_eq!(
            config.checkpoint_path("news"),
            PathBuf::from("model/devnet_news_0.02cr_512bs_30ko_2d.json")
        );
    }

    #[test]
    fn test_dataset_list_is_trimmed() {
        let config = ExperimentConfig {
            dataset: " a, b ,,c".to_string(),
            ..Default::default()
        };
        assert_eq!(config.dataset_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_json_depth_is_checked() {
        let parsed: Result<ExperimentConfig, _> = serde_json::from_str(r#"{"network_depth": 3}"#);
        assert!(parsed.is_err());
        let parsed: ExperimentConfig =
            serde_json::from_str(r#"{"network_depth": 4, "data_format": "sparse"}"#).unwrap();
        assert_eq!(parsed.network_depth, NetworkDepth::Four);
        assert_eq!(parsed.data_format, DataFormat::Sparse);
        assert_eq!(parsed.batch_size, 512);
    }
}
