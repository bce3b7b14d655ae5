//! Results table: one CSV row per dataset/depth configuration.

use std::fs::{self, OpenOptions};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DevNetResult;

/// Aggregate metrics of all runs on one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// `<dataset>_<depth>`
    pub name: String,
    pub n_samples: usize,
    pub dim: usize,
    pub n_samples_trn: usize,
    pub n_outliers_org: usize,
    pub n_outliers: usize,
    pub depth: usize,
    pub rauc: f64,
    pub ap: f64,
    pub std_auc: f64,
    pub std_ap: f64,
    pub train_time: f64,
    pub test_time: f64,
}

/// Append `record` to the CSV table at `path`. The header row is written
/// only when the file is new or empty.
pub fn append_result(path: impl AsRef<Path>, record: &ResultRecord) -> DevNetResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);
    writer.serialize(record)?;
    writer.flush()?;
    Ok(())
}

/// Read every record back from a results table.
pub fn read_results(path: impl AsRef<Path>) -> DevNetResult<Vec<ResultRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}
