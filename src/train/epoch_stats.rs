use serde::{Deserialize, Serialize};

/// Per-epoch training statistics.
///
/// The trainer logs one of these at the end of every completed epoch and,
/// when a progress channel is attached, sends it to the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Epoch budget of this run.
    pub max_epochs: usize,
    /// Mean training loss (cross-entropy plus L2 penalty) over the epoch.
    pub train_loss: f64,
    /// Fraction of training examples classified correctly after the epoch.
    pub train_accuracy: f64,
    /// Mean validation cross-entropy.
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Learning rate used during this epoch.
    pub learning_rate: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}
