//! Deviation network: scoring model, loss, optimizer and checkpoints.

pub mod base_model;
pub mod checkpoint;
pub mod loss;
pub mod network;
pub mod optimizer;

pub use base_model::Scorer;
pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use loss::{DeviationLoss, ReferenceStats};
pub use network::{DenseLayer, DeviationNetwork, LayerGradients};
pub use optimizer::RmsProp;
