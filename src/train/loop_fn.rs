use rand::seq::SliceRandom;
use rand::Rng;

use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::network::gradients::batch_gradients;
use crate::network::network::Network;
use crate::optim::adam::Adam;

/// Settings that stay fixed across the epochs of one run.
pub(crate) struct EpochSettings {
    pub batch_size: usize,
    pub shard_size: usize,
    pub l2_penalty: f64,
}

/// Runs one full epoch of minibatch Adam over the training data.
/// Returns the mean penalized loss over all samples.
///
/// Each minibatch runs forward, backward and one optimizer update, strictly
/// in that order, before the next minibatch reads the parameters.
pub(crate) fn run_one_epoch<R: Rng>(
    network: &mut Network,
    optimizer: &mut Adam,
    inputs: &Matrix,
    targets: &[usize],
    settings: &EpochSettings,
    rng: &mut R,
) -> f64 {
    let n = targets.len();
    let mut total_loss = 0.0;

    // Shuffle sample order each epoch.
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    for batch in indices.chunks(settings.batch_size) {
        let batch_inputs = inputs.select_rows(batch);
        let batch_targets: Vec<usize> = batch.iter().map(|&i| targets[i]).collect();

        let mut step = batch_gradients(network, &batch_inputs, &batch_targets, settings.shard_size);
        step.gradients.add_l2(network, settings.l2_penalty, batch.len());

        let penalty = if settings.l2_penalty > 0.0 {
            let sq: f64 = network.layers().iter().map(|l| l.weights.sum_of_squares()).sum();
            0.5 * settings.l2_penalty * sq / batch.len() as f64
        } else {
            0.0
        };
        total_loss += (step.loss + penalty) * batch.len() as f64;

        optimizer.step(network, &step.gradients);
        tracing::trace!("batch of {} done, loss {:.6}", batch.len(), step.loss);
    }

    total_loss / n as f64
}

/// Forward-only evaluation: mean loss, accuracy and predicted class index per row.
pub(crate) struct Evaluation {
    pub loss: f64,
    pub accuracy: f64,
    pub predictions: Vec<usize>,
}

pub(crate) fn evaluate(network: &Network, inputs: &Matrix, targets: &[usize]) -> Evaluation {
    if targets.is_empty() {
        return Evaluation { loss: 0.0, accuracy: 0.0, predictions: vec![] };
    }
    let probabilities = network.predict_proba(inputs);
    let loss = CrossEntropyLoss::loss(&probabilities, targets);
    let predictions: Vec<usize> = (0..probabilities.rows).map(|r| argmax(probabilities.row(r))).collect();
    let correct = predictions.iter().zip(targets).filter(|(p, t)| p == t).count();
    Evaluation {
        loss,
        accuracy: correct as f64 / targets.len() as f64,
        predictions,
    }
}

/// Index of the maximum element in a slice; the first one wins ties.
pub fn argmax(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, x) in v.iter().enumerate().skip(1) {
        if x.partial_cmp(&v[best]) == Some(std::cmp::Ordering::Greater) {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::network::spec::Architecture;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn argmax_prefers_first_of_ties_and_ignores_nan() {
        assert_eq!(argmax(&[0.1, 0.7, 0.7]), 1);
        assert_eq!(argmax(&[f64::NAN, 0.2, 0.1]), 0);
        assert_eq!(argmax(&[0.2, f64::NAN, 0.9]), 2);
        assert_eq!(argmax(&[]), 0);
    }

    #[test]
    fn epoch_reduces_loss_on_easy_problem() {
        let mut net = Network::new(&Architecture::new(2, vec![8], 2), ActivationFunction::ReLU, 1).unwrap();
        let x = Matrix::from_data(vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.9, 0.1], vec![0.1, 0.9]]);
        let y = [0, 1, 0, 1];
        let mut adam = Adam::with_defaults(&net, 0.05);
        let settings = EpochSettings { batch_size: 2, shard_size: 1, l2_penalty: 0.0 };
        let mut rng = StdRng::seed_from_u64(0);

        let before = evaluate(&net, &x, &y).loss;
        for _ in 0..50 {
            run_one_epoch(&mut net, &mut adam, &x, &y, &settings, &mut rng);
        }
        let after = evaluate(&net, &x, &y);
        assert!(after.loss < before);
        assert_eq!(after.accuracy, 1.0);
        assert_eq!(adam.state().step, 100);
    }
}
