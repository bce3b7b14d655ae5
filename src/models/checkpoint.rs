//! Model checkpoint store.
//!
//! A checkpoint is the JSON form of a [`DeviationNetwork`]: depth, input
//! width and every layer's parameters.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::NetworkDepth;
use crate::error::{DevNetError, DevNetResult};
use crate::models::network::DeviationNetwork;

/// Write `network` to `path`, creating parent directories and replacing any
/// previous checkpoint.
pub fn save_checkpoint(path: impl AsRef<Path>, network: &DeviationNetwork) -> DevNetResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, network)?;
    writer.flush()?;
    Ok(())
}

/// Read a checkpoint back and check it matches the expected architecture.
pub fn load_checkpoint(
    path: impl AsRef<Path>,
    depth: NetworkDepth,
    input_dim: usize,
) -> DevNetResult<DeviationNetwork> {
    let reader = BufReader::new(File::open(path)?);
    let network: DeviationNetwork = serde_json::from_reader(reader)?;
    if network.depth() != depth {
        return Err(DevNetError::shape_mismatch(
            format!("depth {} network", depth),
            format!("depth {} network", network.depth()),
        ));
    }
    if network.input_dim() != input_dim {
        return Err(DevNetError::shape_mismatch(
            format!("{} input features", input_dim),
            format!("{} input features", network.input_dim()),
        ));
    }
    Ok(network)
}
