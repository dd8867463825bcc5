pub mod artifact;
pub mod predictor;

pub use artifact::{LayerParams, ModelArtifact, MODEL_TYPE};
pub use predictor::{Prediction, Predictor};
