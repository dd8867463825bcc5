use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};

/// How many training examples go into each optimizer update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSize {
    /// `min(200, n_train)`.
    #[default]
    Auto,
    /// The whole training partition in one batch.
    Full,
    Fixed(usize),
}

impl BatchSize {
    pub fn resolve(&self, n_train: usize) -> usize {
        let size = match *self {
            BatchSize::Auto => n_train.min(200),
            BatchSize::Full => n_train,
            BatchSize::Fixed(b) => b.min(n_train),
        };
        size.max(1)
    }
}

impl fmt::Display for BatchSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSize::Auto => f.write_str("auto"),
            BatchSize::Full => f.write_str("full"),
            BatchSize::Fixed(b) => write!(f, "{b}"),
        }
    }
}

impl FromStr for BatchSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "auto" => Ok(BatchSize::Auto),
            "full" => Ok(BatchSize::Full),
            n => n
                .parse::<usize>()
                .map(BatchSize::Fixed)
                .map_err(|_| format!("batch size must be 'auto', 'full' or a number, got '{n}'")),
        }
    }
}

/// Hyperparameters of one training run. Immutable once training starts.
///
/// Every field has a default, so a JSON file only needs the fields it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub hidden_sizes: Vec<usize>,
    pub activation: ActivationFunction,
    pub learning_rate: f64,
    /// L2 penalty on weights (not biases).
    pub l2_penalty: f64,
    pub batch_size: BatchSize,
    pub max_epochs: usize,
    pub seed: u64,
    pub validation_fraction: f64,
    /// Classes with fewer examples than this cannot be stratified.
    pub min_examples_per_class: usize,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// Epochs without validation improvement before the learning rate halves.
    pub patience: usize,
    /// Smallest validation-loss decrease that counts as improvement.
    pub tolerance: f64,
    pub min_learning_rate: f64,
    /// Training loss at or below this ends the run as converged.
    pub target_loss: f64,
    /// Examples per parallel gradient shard within a minibatch.
    pub shard_size: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            hidden_sizes: vec![128, 64],
            activation: ActivationFunction::ReLU,
            learning_rate: 0.001,
            l2_penalty: 0.0001,
            batch_size: BatchSize::Auto,
            max_epochs: 200,
            seed: 42,
            validation_fraction: 0.2,
            min_examples_per_class: 2,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            patience: 10,
            tolerance: 1e-4,
            min_learning_rate: 1e-6,
            target_loss: 1e-4,
            shard_size: 32,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(NnError::InvalidConfig(msg)) };

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return invalid(format!("validation_fraction must lie in (0, 1), got {}", self.validation_fraction));
        }
        if self.max_epochs == 0 {
            return invalid("max_epochs must be at least 1".into());
        }
        if self.batch_size == BatchSize::Fixed(0) {
            return invalid("batch_size must be at least 1".into());
        }
        if self.min_examples_per_class == 0 {
            return invalid("min_examples_per_class must be at least 1".into());
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return invalid(format!("beta1/beta2 must lie in [0, 1), got {}/{}", self.beta1, self.beta2));
        }
        if self.epsilon <= 0.0 {
            return invalid(format!("epsilon must be positive, got {}", self.epsilon));
        }
        if self.l2_penalty < 0.0 || self.tolerance < 0.0 || self.min_learning_rate < 0.0 {
            return invalid("l2_penalty, tolerance and min_learning_rate must be non-negative".into());
        }
        if self.patience == 0 || self.shard_size == 0 {
            return invalid("patience and shard_size must be at least 1".into());
        }
        Ok(())
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a config from a JSON file; missing fields take defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<TrainingConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: TrainingConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}
