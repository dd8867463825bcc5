use rand::{rngs::StdRng, SeedableRng};

use crate::activation::activation::{softmax_rows, ActivationFunction};
use crate::error::{NnError, Result};
use crate::layers::dense::Layer;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::network::gradients::Gradients;
use crate::network::spec::Architecture;

/// Feedforward classifier: hidden layers use `activation`, the final layer
/// is always linear followed by softmax.
///
/// A `Network` never performs I/O and its forward/backward passes take
/// `&self`, so several threads can evaluate it at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layers: Vec<Layer>,
    activation: ActivationFunction,
}

/// Everything the backward pass needs from one forward call.
///
/// `pre_activations[k]` is `z` of layer `k`; `activations[k]` is its output
/// (the last entry holds the softmax probabilities).
#[derive(Debug, Clone)]
pub struct ForwardCache {
    pub inputs: Matrix,
    pub pre_activations: Vec<Matrix>,
    pub activations: Vec<Matrix>,
}

impl ForwardCache {
    pub fn probabilities(&self) -> &Matrix {
        // Networks always have at least one layer.
        &self.activations[self.activations.len() - 1]
    }

    pub fn into_probabilities(mut self) -> Matrix {
        self.activations.pop().unwrap_or_default()
    }
}

impl Network {
    /// Builds a freshly initialized network. The same `seed` always yields
    /// the same parameters.
    pub fn new(architecture: &Architecture, activation: ActivationFunction, seed: u64) -> Result<Network> {
        architecture.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let dims = architecture.layer_dims();
        let last = dims.len() - 1;
        let layers = dims
            .into_iter()
            .enumerate()
            .map(|(k, (input_size, size))| {
                // The output layer feeds softmax, so it gets the default bound.
                let factor = if k == last { 6.0 } else { activation.init_factor() };
                Layer::new(input_size, size, factor, &mut rng)
            })
            .collect();
        Ok(Network { layers, activation })
    }

    /// Assembles a network from existing layers, checking that each layer's
    /// input width equals the previous layer's output width.
    pub fn from_layers(layers: Vec<Layer>, activation: ActivationFunction) -> Result<Network> {
        if layers.is_empty() {
            return Err(NnError::Architecture("a network needs at least one layer".into()));
        }
        for (k, pair) in layers.windows(2).enumerate() {
            if pair[0].size() != pair[1].input_size() {
                return Err(NnError::Architecture(format!(
                    "layer {} outputs {} values but layer {} expects {}",
                    k + 1,
                    pair[0].size(),
                    k + 2,
                    pair[1].input_size()
                )));
            }
        }
        let network = Network { layers, activation };
        network.architecture().validate()?;
        Ok(network)
    }

    pub fn architecture(&self) -> Architecture {
        let hidden_sizes = self.layers[..self.layers.len() - 1].iter().map(Layer::size).collect();
        Architecture::new(self.input_size(), hidden_sizes, self.output_size())
    }

    pub fn activation(&self) -> ActivationFunction {
        self.activation
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].size()
    }

    /// Forward pass over a batch (one example per row), keeping every
    /// intermediate value for [`Network::backward`].
    pub fn forward(&self, inputs: &Matrix) -> ForwardCache {
        assert_eq!(inputs.cols, self.input_size(), "input width does not match the network");
        let last = self.layers.len() - 1;
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut activations: Vec<Matrix> = Vec::with_capacity(self.layers.len());

        for (k, layer) in self.layers.iter().enumerate() {
            let z = layer.feed_from(activations.last().unwrap_or(inputs));
            let a = if k == last {
                softmax_rows(&z)
            } else {
                let act = self.activation;
                z.map(|x| act.function(x))
            };
            pre_activations.push(z);
            activations.push(a);
        }

        ForwardCache { inputs: inputs.clone(), pre_activations, activations }
    }

    /// Class probabilities for a batch, without keeping the cache.
    pub fn predict_proba(&self, inputs: &Matrix) -> Matrix {
        self.forward(inputs).into_probabilities()
    }

    /// Backward pass: cross-entropy gradients averaged over the batch.
    ///
    /// Consumes the cache of the matching forward call.
    pub fn backward(&self, cache: ForwardCache, targets: &[usize]) -> Gradients {
        let n = targets.len();
        let mut grads = self.backward_sum(&cache, targets);
        if n > 0 {
            grads.scale(1.0 / n as f64);
        }
        grads
    }

    /// Backward pass with gradients summed (not averaged) over the batch.
    pub(crate) fn backward_sum(&self, cache: &ForwardCache, targets: &[usize]) -> Gradients {
        assert_eq!(cache.inputs.rows, targets.len(), "one target per cached example");
        assert_eq!(cache.activations.len(), self.layers.len(), "cache does not match this network");

        let mut weights = vec![Matrix::default(); self.layers.len()];
        let mut biases = vec![Matrix::default(); self.layers.len()];

        // Softmax paired with cross-entropy: ∂L/∂z = p - y.
        let mut delta = CrossEntropyLoss::derivative(cache.probabilities(), targets);

        for k in (0..self.layers.len()).rev() {
            let layer = &self.layers[k];
            let input_for_layer = if k == 0 { &cache.inputs } else { &cache.activations[k - 1] };
            let (w_grad, b_grad) = layer.compute_gradients(&delta, input_for_layer);
            assert_eq!(w_grad.shape(), layer.weights.shape(), "weight gradient shape");
            assert_eq!(b_grad.shape(), layer.biases.shape(), "bias gradient shape");

            if k > 0 {
                let act = self.activation;
                let act_derivative = cache.pre_activations[k - 1].map(|x| act.derivative(x));
                delta = layer.propagate(&delta).hadamard(&act_derivative);
            }

            weights[k] = w_grad;
            biases[k] = b_grad;
        }

        Gradients { weights, biases }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Network {
        Network::new(&Architecture::new(3, vec![4], 2), ActivationFunction::ReLU, 9).unwrap()
    }

    #[test]
    fn same_seed_same_parameters() {
        let arch = Architecture::new(8, vec![5, 4], 3);
        let a = Network::new(&arch, ActivationFunction::ReLU, 42).unwrap();
        let b = Network::new(&arch, ActivationFunction::ReLU, 42).unwrap();
        let c = Network::new(&arch, ActivationFunction::ReLU, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn from_layers_rejects_broken_chain() {
        let layers = vec![
            Layer::from_parts(Matrix::zeros(3, 4), Matrix::zeros(1, 4)),
            Layer::from_parts(Matrix::zeros(5, 2), Matrix::zeros(1, 2)),
        ];
        let err = Network::from_layers(layers, ActivationFunction::ReLU).unwrap_err();
        assert!(matches!(err, NnError::Architecture(_)));
    }

    #[test]
    fn forward_caches_every_layer_and_outputs_distributions() {
        let net = small();
        let x = Matrix::from_data(vec![vec![1.0, 0.0, 1.0], vec![0.0, 0.0, 0.0]]);
        let cache = net.forward(&x);
        assert_eq!(cache.pre_activations.len(), 2);
        assert_eq!(cache.activations[0].shape(), (2, 4));
        assert!(cache.activations[0].as_slice().iter().all(|&v| v >= 0.0));
        let p = cache.probabilities();
        for r in 0..2 {
            assert!((p.row(r).iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut net = Network::new(&Architecture::new(3, vec![4], 3), ActivationFunction::Tanh, 3).unwrap();
        let x = Matrix::from_data(vec![vec![0.5, -1.0, 2.0], vec![1.0, 0.3, -0.2]]);
        let targets = [2, 0];
        let grads = net.backward(net.forward(&x), &targets);

        let h = 1e-6;
        for k in 0..net.layers().len() {
            for (r, c) in [(0, 0), (1, 1), (2, net.layers()[k].size() - 1)] {
                let original = net.layers()[k].weights.get(r, c);
                net.layers_mut()[k].weights.set(r, c, original + h);
                let plus = CrossEntropyLoss::loss(&net.predict_proba(&x), &targets);
                net.layers_mut()[k].weights.set(r, c, original - h);
                let minus = CrossEntropyLoss::loss(&net.predict_proba(&x), &targets);
                net.layers_mut()[k].weights.set(r, c, original);
                let numeric = (plus - minus) / (2.0 * h);
                let analytic = grads.weights[k].get(r, c);
                assert!((numeric - analytic).abs() < 1e-6, "layer {k} ({r},{c}): {numeric} vs {analytic}");
            }
        }
    }

    #[test]
    fn gradients_mirror_parameter_shapes() {
        let net = small();
        let x = Matrix::from_data(vec![vec![1.0, 2.0, 3.0]]);
        let grads = net.backward(net.forward(&x), &[1]);
        for (layer, (gw, gb)) in net.layers().iter().zip(grads.weights.iter().zip(&grads.biases)) {
            assert_eq!(layer.weights.shape(), gw.shape());
            assert_eq!(layer.biases.shape(), gb.shape());
        }
    }
}
