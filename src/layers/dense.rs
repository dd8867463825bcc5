use rand::Rng;

use crate::math::matrix::Matrix;

/// Fully connected layer: `z = x * W + b`.
///
/// `weights` has shape `(input_size, size)` and `biases` shape `(1, size)`.
/// The shapes are fixed at construction; updates only change values.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub weights: Matrix,
    pub biases: Matrix,
}

impl Layer {
    /// Glorot-uniform initialized layer. Biases use the same bound.
    pub fn new<R: Rng>(input_size: usize, size: usize, init_factor: f64, rng: &mut R) -> Layer {
        let weights = Matrix::glorot_uniform(input_size, size, input_size, size, init_factor, rng);
        let biases = Matrix::glorot_uniform(1, size, input_size, size, init_factor, rng);
        Layer { weights, biases }
    }

    pub fn from_parts(weights: Matrix, biases: Matrix) -> Layer {
        assert_eq!(biases.rows, 1, "biases must be a row vector");
        assert_eq!(weights.cols, biases.cols, "weights and biases disagree on layer width");
        Layer { weights, biases }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn size(&self) -> usize {
        self.weights.cols
    }

    /// Pre-activation values for a batch (one example per row).
    pub fn feed_from(&self, input: &Matrix) -> Matrix {
        input.dot(&self.weights).add_row(&self.biases)
    }

    /// Gradients summed over the batch. Returns (weights_grad, biases_grad).
    ///
    /// `delta` is ∂L/∂z for this layer (already multiplied by the activation
    /// derivative), `inputs` the activations that fed it.
    pub fn compute_gradients(&self, delta: &Matrix, inputs: &Matrix) -> (Matrix, Matrix) {
        assert_eq!(delta.rows, inputs.rows, "delta and inputs disagree on batch size");
        let weights_grad = inputs.transpose().dot(delta);
        let biases_grad = delta.sum_rows();
        (weights_grad, biases_grad)
    }

    /// Pushes ∂L/∂z back through the weights, giving ∂L/∂a of the previous layer.
    pub fn propagate(&self, delta: &Matrix) -> Matrix {
        delta.dot(&self.weights.transpose())
    }

    /// Subtracts pre-computed parameter steps.
    pub fn apply_steps(&mut self, weights_step: &Matrix, biases_step: &Matrix) {
        assert_eq!(self.weights.shape(), weights_step.shape(), "weight step shape changed");
        assert_eq!(self.biases.shape(), biases_step.shape(), "bias step shape changed");
        self.weights.add_scaled(weights_step, -1.0);
        self.biases.add_scaled(biases_step, -1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn fixed_layer() -> Layer {
        Layer::from_parts(
            Matrix::from_data(vec![vec![1.0, -1.0], vec![0.5, 2.0]]),
            Matrix::row_vector(vec![0.1, 0.2]),
        )
    }

    #[test]
    fn new_layer_has_declared_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let layer = Layer::new(5, 3, 6.0, &mut rng);
        assert_eq!(layer.weights.shape(), (5, 3));
        assert_eq!(layer.biases.shape(), (1, 3));
        assert_eq!(layer.input_size(), 5);
        assert_eq!(layer.size(), 3);
    }

    #[test]
    fn feed_from_is_affine() {
        let z = fixed_layer().feed_from(&Matrix::from_data(vec![vec![1.0, 1.0], vec![2.0, 0.0]]));
        assert_eq!(z.to_rows(), vec![vec![1.6, 1.2], vec![2.1, -1.8]]);
    }

    #[test]
    fn gradients_match_outer_product_sum() {
        let layer = fixed_layer();
        let inputs = Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let delta = Matrix::from_data(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let (dw, db) = layer.compute_gradients(&delta, &inputs);
        assert_eq!(dw.to_rows(), vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
        assert_eq!(db.to_rows(), vec![vec![1.0, 1.0]]);
    }

    #[test]
    fn apply_steps_keeps_shape() {
        let mut layer = fixed_layer();
        layer.apply_steps(&Matrix::zeros(2, 2), &Matrix::row_vector(vec![0.1, 0.1]));
        assert_eq!(layer.weights.shape(), (2, 2));
        assert!((layer.biases.get(0, 0)).abs() < 1e-12);
    }
}
