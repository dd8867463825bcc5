use rayon::prelude::*;

use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::network::network::Network;

/// One gradient tensor per weight matrix and bias vector, in layer order.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub weights: Vec<Matrix>,
    pub biases: Vec<Matrix>,
}

impl Gradients {
    pub fn zeros_like(network: &Network) -> Gradients {
        let weights = network.layers().iter().map(|l| Matrix::zeros(l.weights.rows, l.weights.cols)).collect();
        let biases = network.layers().iter().map(|l| Matrix::zeros(l.biases.rows, l.biases.cols)).collect();
        Gradients { weights, biases }
    }

    pub fn scale(&mut self, factor: f64) {
        for m in self.weights.iter_mut().chain(self.biases.iter_mut()) {
            *m = m.scale(factor);
        }
    }

    pub fn accumulate(&mut self, other: &Gradients) {
        assert_eq!(self.weights.len(), other.weights.len(), "gradient layer count");
        for (a, b) in self.weights.iter_mut().zip(&other.weights) {
            a.add_scaled(b, 1.0);
        }
        for (a, b) in self.biases.iter_mut().zip(&other.biases) {
            a.add_scaled(b, 1.0);
        }
    }

    /// Adds the L2 penalty term `alpha * W / n` to the weight gradients.
    /// Biases are not penalized.
    pub fn add_l2(&mut self, network: &Network, alpha: f64, n: usize) {
        if alpha == 0.0 || n == 0 {
            return;
        }
        let factor = alpha / n as f64;
        for (g, layer) in self.weights.iter_mut().zip(network.layers()) {
            g.add_scaled(&layer.weights, factor);
        }
    }
}

/// Averaged gradients and mean loss of one minibatch.
#[derive(Debug, Clone)]
pub struct BatchGradients {
    pub gradients: Gradients,
    pub loss: f64,
}

/// Computes forward + backward for a minibatch, split into fixed-size shards
/// that run on the rayon pool.
///
/// Workers only read `network`; each shard writes its own gradient buffer.
/// Shard results are summed in shard order, so the outcome does not depend on
/// how many threads ran them.
pub fn batch_gradients(network: &Network, inputs: &Matrix, targets: &[usize], shard_size: usize) -> BatchGradients {
    assert_eq!(inputs.rows, targets.len(), "one target per example");
    let n = targets.len();
    let shard_size = shard_size.max(1);

    let starts: Vec<usize> = (0..n).step_by(shard_size).collect();
    let shards: Vec<(Gradients, f64)> = starts
        .par_iter()
        .map(|&start| {
            let end = (start + shard_size).min(n);
            let rows: Vec<usize> = (start..end).collect();
            let shard_inputs = inputs.select_rows(&rows);
            let shard_targets = &targets[start..end];
            let cache = network.forward(&shard_inputs);
            let loss_sum = CrossEntropyLoss::loss(cache.probabilities(), shard_targets) * (end - start) as f64;
            (network.backward_sum(&cache, shard_targets), loss_sum)
        })
        .collect();

    let mut gradients = Gradients::zeros_like(network);
    let mut loss_sum = 0.0;
    for (g, l) in &shards {
        gradients.accumulate(g);
        loss_sum += l;
    }
    if n > 0 {
        gradients.scale(1.0 / n as f64);
    }

    BatchGradients {
        gradients,
        loss: if n > 0 { loss_sum / n as f64 } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::network::spec::Architecture;

    fn fixture() -> (Network, Matrix, Vec<usize>) {
        let net = Network::new(&Architecture::new(4, vec![6], 3), ActivationFunction::ReLU, 11).unwrap();
        let rows: Vec<Vec<f64>> = (0..10)
            .map(|i| (0..4).map(|j| ((i * 7 + j * 3) % 5) as f64 / 4.0).collect())
            .collect();
        let targets = (0..10).map(|i| i % 3).collect();
        (net, Matrix::from_data(rows), targets)
    }

    #[test]
    fn sharded_gradients_equal_whole_batch_gradients() {
        let (net, x, y) = fixture();
        let whole = net.backward(net.forward(&x), &y);
        let sharded = batch_gradients(&net, &x, &y, 3).gradients;
        for (a, b) in whole.weights.iter().chain(&whole.biases).zip(sharded.weights.iter().chain(&sharded.biases)) {
            for (u, v) in a.as_slice().iter().zip(b.as_slice()) {
                assert!((u - v).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn sharding_is_deterministic() {
        let (net, x, y) = fixture();
        let a = batch_gradients(&net, &x, &y, 4);
        let b = batch_gradients(&net, &x, &y, 4);
        assert_eq!(a.gradients, b.gradients);
        assert_eq!(a.loss, b.loss);
    }

    #[test]
    fn l2_only_touches_weights() {
        let (net, _, _) = fixture();
        let mut g = Gradients::zeros_like(&net);
        g.add_l2(&net, 0.5, 2);
        assert_eq!(g.weights[0].get(0, 0), net.layers()[0].weights.get(0, 0) * 0.25);
        assert!(g.biases.iter().all(|b| b.as_slice().iter().all(|&x| x == 0.0)));
    }
}
