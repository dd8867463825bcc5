use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;

use rand::{rngs::StdRng, SeedableRng};

use crate::data::dataset::Dataset;
use crate::data::split::stratified_split;
use crate::error::{NnError, Result};
use crate::model::artifact::ModelArtifact;
use crate::model::predictor::Predictor;
use crate::network::network::Network;
use crate::network::spec::Architecture;
use crate::optim::adam::Adam;
use crate::optim::schedule::{PlateauSchedule, ScheduleDecision};
use crate::train::epoch_stats::EpochStats;
use crate::train::loop_fn::{evaluate, run_one_epoch, EpochSettings};
use crate::train::report::{ClassificationReport, StopReason, TrainingReport};
use crate::train::train_config::TrainingConfig;

/// Where a [`Trainer`] is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerPhase {
    Initialized,
    Splitting,
    Training { epoch: usize },
    Validating { epoch: usize },
    Finished(StopReason),
}

/// Lifecycle of the network a trainer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Untrained,
    Training,
    Trained,
}

/// A network that finished training, with the labels its outputs map to.
///
/// Only [`Trainer::fit`] produces one, and it is the only way to export a
/// network from outside the crate:
///
/// ```compile_fail
/// use ferrite_digits::{ActivationFunction, Architecture, ModelArtifact, Network};
///
/// let net = Network::new(&Architecture::new(4, vec![3], 2), ActivationFunction::ReLU, 0).unwrap();
/// let _ = ModelArtifact::from_network(&net, &[0, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct TrainedModel {
    network: Network,
    classes: Vec<usize>,
    report: TrainingReport,
}

impl TrainedModel {
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Label of each output unit, ascending.
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    pub fn to_artifact(&self) -> Result<ModelArtifact> {
        ModelArtifact::from_network(&self.network, &self.classes)
    }

    pub fn predictor(&self) -> Predictor {
        Predictor::from_network(self.network.clone(), self.classes.clone())
    }
}

/// Runs one training job: split, epochs of minibatch Adam, validation after
/// every epoch, and the stop policy.
///
/// # Early termination
/// The run ends early if:
/// - training loss reaches `target_loss` (`Converged`),
/// - the plateau schedule would push the learning rate below its floor,
/// - the stop flag is set, or the progress receiver has been dropped.
///
/// Every epoch leaves the network in a valid state, so stopping between
/// epochs always yields a usable model.
pub struct Trainer {
    config: TrainingConfig,
    phase: TrainerPhase,
    progress_tx: Option<mpsc::Sender<EpochStats>>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Trainer> {
        config.validate()?;
        Ok(Trainer {
            config,
            phase: TrainerPhase::Initialized,
            progress_tx: None,
            stop_flag: None,
        })
    }

    /// One `EpochStats` is sent per completed epoch.
    pub fn with_progress(mut self, tx: mpsc::Sender<EpochStats>) -> Trainer {
        self.progress_tx = Some(tx);
        self
    }

    /// When set to `true` from another thread the run ends after the current epoch.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Trainer {
        self.stop_flag = Some(flag);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn phase(&self) -> TrainerPhase {
        self.phase
    }

    pub fn model_state(&self) -> ModelState {
        match self.phase {
            TrainerPhase::Initialized | TrainerPhase::Splitting => ModelState::Untrained,
            TrainerPhase::Training { .. } | TrainerPhase::Validating { .. } => ModelState::Training,
            TrainerPhase::Finished(_) => ModelState::Trained,
        }
    }

    fn enter(&mut self, phase: TrainerPhase) {
        tracing::debug!("trainer phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag.as_ref().is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Trains a fresh network on `dataset`. The dataset is only read.
    pub fn fit(&mut self, dataset: &Dataset) -> Result<TrainedModel> {
        let cfg = self.config.clone();
        let classes = dataset.classes();
        if classes.len() < 2 {
            return Err(NnError::InsufficientData(format!(
                "need examples of at least 2 classes, found {}",
                classes.len()
            )));
        }
        let position: BTreeMap<usize, usize> = classes.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let to_targets = |idx: &[usize]| -> Vec<usize> { dataset.labels(idx).iter().map(|l| position[l]).collect() };

        self.enter(TrainerPhase::Splitting);
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let split = stratified_split(dataset, cfg.validation_fraction, cfg.min_examples_per_class, &mut rng)?;
        let train_x = dataset.features(&split.train);
        let train_y = to_targets(&split.train);
        let val_x = dataset.features(&split.validation);
        let val_y = to_targets(&split.validation);

        let architecture = Architecture::new(dataset.input_size(), cfg.hidden_sizes.clone(), classes.len());
        let mut network = Network::new(&architecture, cfg.activation, cfg.seed)?;
        let mut optimizer = Adam::new(&network, cfg.learning_rate, cfg.beta1, cfg.beta2, cfg.epsilon);
        let mut schedule = PlateauSchedule::new(cfg.learning_rate, cfg.patience, cfg.tolerance, cfg.min_learning_rate);
        let settings = EpochSettings {
            batch_size: cfg.batch_size.resolve(train_y.len()),
            shard_size: cfg.shard_size,
            l2_penalty: cfg.l2_penalty,
        };

        tracing::info!(
            "Training {:?} ({}) on {} examples, batch size {}",
            architecture.layer_dims(),
            cfg.activation,
            train_y.len(),
            settings.batch_size
        );

        let mut history = Vec::new();
        let mut stop_reason = StopReason::MaxEpochsReached;

        for epoch in 1..=cfg.max_epochs {
            if self.stop_requested() {
                stop_reason = StopReason::Cancelled;
                break;
            }

            self.enter(TrainerPhase::Training { epoch });
            let t_start = Instant::now();
            let learning_rate = optimizer.learning_rate;
            let train_loss = run_one_epoch(&mut network, &mut optimizer, &train_x, &train_y, &settings, &mut rng);

            self.enter(TrainerPhase::Validating { epoch });
            let train_eval = evaluate(&network, &train_x, &train_y);
            let val_eval = evaluate(&network, &val_x, &val_y);

            let stats = EpochStats {
                epoch,
                max_epochs: cfg.max_epochs,
                train_loss,
                train_accuracy: train_eval.accuracy,
                val_loss: val_eval.loss,
                val_accuracy: val_eval.accuracy,
                learning_rate,
                elapsed_ms: t_start.elapsed().as_millis() as u64,
            };
            tracing::info!(
                "epoch {}/{}: loss {:.6} acc {:.4} | val loss {:.6} acc {:.4}",
                epoch,
                cfg.max_epochs,
                stats.train_loss,
                stats.train_accuracy,
                stats.val_loss,
                stats.val_accuracy
            );
            history.push(stats.clone());

            if let Some(ref tx) = self.progress_tx {
                // If the receiver has been dropped, stop training.
                if tx.send(stats).is_err() {
                    stop_reason = StopReason::Cancelled;
                    break;
                }
            }

            if train_loss <= cfg.target_loss {
                stop_reason = StopReason::Converged;
                break;
            }

            match schedule.observe(val_eval.loss) {
                ScheduleDecision::Halved(lr) => {
                    tracing::warn!(
                        "validation loss has not improved for {} epochs; learning rate halved to {:e}",
                        cfg.patience,
                        lr
                    );
                    optimizer.learning_rate = lr;
                }
                ScheduleDecision::BelowFloor => {
                    stop_reason = StopReason::LearningRateFloor;
                    break;
                }
                ScheduleDecision::Improved | ScheduleDecision::Waiting => {}
            }
        }

        let final_eval = evaluate(&network, &val_x, &val_y);
        let validation =
            ClassificationReport::from_predictions(&classes, &final_eval.predictions, &val_y, final_eval.loss);
        tracing::info!("Training stopped after {} epoch(s): {}", history.len(), stop_reason);
        tracing::info!("Validation accuracy: {:.4}", validation.accuracy);
        tracing::debug!("Classification report:\n{}", validation);

        self.enter(TrainerPhase::Finished(stop_reason));
        Ok(TrainedModel {
            network,
            classes,
            report: TrainingReport {
                stop_reason,
                epochs_run: history.len(),
                final_learning_rate: optimizer.learning_rate,
                history,
                validation,
            },
        })
    }
}
