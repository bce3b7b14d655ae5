//! Feature matrices, dataset loading and train/test splitting.

pub mod loader;
pub mod matrix;
pub mod split;

pub use loader::{load_dataset, Dataset};
pub use matrix::{CscMatrix, CsrBuilder, CsrMatrix, FeatureMatrix};
pub use split::{partition_indices, stratified_split, Split};
