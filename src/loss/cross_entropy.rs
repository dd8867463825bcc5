use crate::math::matrix::Matrix;

/// Categorical cross-entropy loss for use with a softmax output layer.
pub struct CrossEntropyLoss;

/// Probabilities are clamped to at least this before `ln` so a confident
/// wrong answer yields a large but finite loss.
const EPS: f64 = 1e-12;

impl CrossEntropyLoss {
    /// Mean negative log-probability of the true class over a batch.
    ///
    /// `probabilities` — softmax output, shape `(batch, n_classes)`
    /// `targets`       — class index per row
    ///
    /// A NaN probability makes the loss NaN, so a diverged network shows up
    /// in the reported metrics.
    pub fn loss(probabilities: &Matrix, targets: &[usize]) -> f64 {
        assert_eq!(probabilities.rows, targets.len(), "one target per row");
        if targets.is_empty() {
            return 0.0;
        }
        let total: f64 = targets
            .iter()
            .enumerate()
            .map(|(r, &t)| Self::sample_loss(probabilities.get(r, t)))
            .sum();
        total / targets.len() as f64
    }

    /// `ln(1/p)` rather than `-ln(p)`: a certain prediction gives `+0.0`, not `-0.0`.
    fn sample_loss(p: f64) -> f64 {
        if p.is_nan() {
            return f64::NAN;
        }
        (1.0 / p.max(EPS)).ln()
    }

    /// Gradient of softmax + cross-entropy w.r.t. the logits, per row:
    ///   ∂L/∂z = predicted - one_hot(target)
    ///
    /// Not averaged; the backward pass divides by the batch size.
    pub fn derivative(probabilities: &Matrix, targets: &[usize]) -> Matrix {
        assert_eq!(probabilities.rows, targets.len(), "one target per row");
        let mut delta = probabilities.clone();
        for (r, &t) in targets.iter().enumerate() {
            delta.set(r, t, delta.get(r, t) - 1.0);
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loss_is_negative_log_of_true_class() {
        let p = Matrix::from_data(vec![vec![0.25, 0.75], vec![0.5, 0.5]]);
        let l = CrossEntropyLoss::loss(&p, &[1, 0]);
        let expected = (-(0.75f64).ln() - (0.5f64).ln()) / 2.0;
        assert!((l - expected).abs() < 1e-12);
    }

    #[test]
    fn zero_probability_gives_finite_loss() {
        let p = Matrix::from_data(vec![vec![1.0, 0.0]]);
        assert!(CrossEntropyLoss::loss(&p, &[1]).is_finite());
    }

    #[test]
    fn certain_prediction_has_positive_zero_loss() {
        let p = Matrix::from_data(vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
        let l = CrossEntropyLoss::loss(&p, &[1, 0]);
        assert_eq!(l, 0.0);
        assert!(l.is_sign_positive());
        assert_eq!(format!("{l:.3e}"), "0.000e0");
    }

    #[test]
    fn nan_probability_yields_nan_loss() {
        let p = Matrix::from_data(vec![vec![f64::NAN, f64::NAN], vec![0.5, 0.5]]);
        assert!(CrossEntropyLoss::loss(&p, &[0, 1]).is_nan());
    }

    #[test]
    fn derivative_is_prediction_minus_one_hot() {
        let p = Matrix::from_data(vec![vec![0.2, 0.3, 0.5]]);
        let d = CrossEntropyLoss::derivative(&p, &[2]);
        let row = d.row(0);
        assert!((row[0] - 0.2).abs() < 1e-12);
        assert!((row[1] - 0.3).abs() < 1e-12);
        assert!((row[2] + 0.5).abs() < 1e-12);
    }
}
