pub mod epoch_stats;
pub mod loop_fn;
pub mod report;
pub mod train_config;
pub mod trainer;

pub use epoch_stats::EpochStats;
pub use loop_fn::argmax;
pub use report::{ClassMetrics, ClassificationReport, StopReason, TrainingReport};
pub use train_config::{BatchSize, TrainingConfig};
pub use trainer::{ModelState, TrainedModel, Trainer, TrainerPhase};
