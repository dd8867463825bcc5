use serde::{Deserialize, Serialize};
use std::fmt;

use crate::train::epoch_stats::EpochStats;

/// Why a training run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Training loss reached the configured target.
    Converged,
    MaxEpochsReached,
    /// Halving the learning rate again would drop it below the floor.
    LearningRateFloor,
    /// The caller set the stop flag or dropped the progress receiver.
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Converged => "converged",
            StopReason::MaxEpochsReached => "epoch budget exhausted",
            StopReason::LearningRateFloor => "learning rate reached its floor",
            StopReason::Cancelled => "cancelled by caller",
        };
        f.write_str(s)
    }
}

/// Precision, recall and F1 of one class on the validation partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Final validation metrics of a trained network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub loss: f64,
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
}

impl ClassificationReport {
    /// `predictions` and `targets` hold positions into `classes`.
    pub fn from_predictions(classes: &[usize], predictions: &[usize], targets: &[usize], loss: f64) -> ClassificationReport {
        let k = classes.len();
        let mut true_pos = vec![0usize; k];
        let mut predicted = vec![0usize; k];
        let mut support = vec![0usize; k];
        for (&p, &t) in predictions.iter().zip(targets) {
            predicted[p] += 1;
            support[t] += 1;
            if p == t {
                true_pos[t] += 1;
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let per_class = (0..k)
            .map(|c| {
                let precision = ratio(true_pos[c], predicted[c]);
                let recall = ratio(true_pos[c], support[c]);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics { class: classes[c], precision, recall, f1, support: support[c] }
            })
            .collect();

        ClassificationReport {
            loss,
            accuracy: ratio(true_pos.iter().sum(), targets.len()),
            per_class,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>8} {:>10} {:>10} {:>10} {:>8}", "class", "precision", "recall", "f1-score", "support")?;
        for m in &self.per_class {
            writeln!(f, "{:>8} {:>10.2} {:>10.2} {:>10.2} {:>8}", m.class, m.precision, m.recall, m.f1, m.support)?;
        }
        write!(f, "accuracy {:.4}  loss {:.4}", self.accuracy, self.loss)
    }
}

/// Outcome of a finished training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub stop_reason: StopReason,
    pub epochs_run: usize,
    pub final_learning_rate: f64,
    pub history: Vec<EpochStats>,
    pub validation: ClassificationReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_class_metrics() {
        let classes = [3, 8];
        // targets: 3,3,8,8 ; predictions: 3,8,8,8
        let report = ClassificationReport::from_predictions(&classes, &[0, 1, 1, 1], &[0, 0, 1, 1], 0.4);
        assert_eq!(report.accuracy, 0.75);
        let c3 = &report.per_class[0];
        assert_eq!((c3.class, c3.precision, c3.recall, c3.support), (3, 1.0, 0.5, 2));
        let c8 = &report.per_class[1];
        assert!((c8.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(c8.recall, 1.0);
        assert!(report.to_string().contains("accuracy 0.7500"));
    }

    #[test]
    fn unpredicted_class_has_zero_precision() {
        let report = ClassificationReport::from_predictions(&[0, 1], &[0, 0], &[0, 1], 1.0);
        assert_eq!(report.per_class[1].precision, 0.0);
        assert_eq!(report.per_class[1].f1, 0.0);
    }
}
