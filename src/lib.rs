pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod data;
pub mod train;
pub mod model;

// Convenience re-exports
pub use error::{NnError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::{Architecture, Network};
pub use optim::adam::Adam;
pub use data::{load_dir, load_sources, Dataset, Example};
pub use train::{TrainedModel, Trainer, TrainingConfig};
pub use model::{ModelArtifact, Prediction, Predictor};
